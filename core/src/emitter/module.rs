//! Assembles the WASM module's sections from a function index table and the
//! per-function code bodies produced by `function::FuncEmitter` (spec.md
//! §4.4 "Module shape" / "Function indexing" / "Entry points").

use crate::{
    analyzer::registry::api_registry,
    types::WasmType,
};
use std::collections::HashMap;

use super::function::CompiledFunction;
use super::layout::TypeTable;
use super::leb128::{write_name, write_section, write_uleb128};

pub const WASM_PAGE_SIZE: u32 = 65536;

/// One non-import function slated for emission: its WASM type index and
/// already-compiled body, plus an optional export name.
pub struct FuncEntry {
    pub type_index: u32,
    pub compiled: CompiledFunction,
    pub export_name: Option<String>,
}

pub fn build_function_index() -> HashMap<String, u32> {
    let mut map = HashMap::new();
    for (i, api) in api_registry().into_iter().enumerate() {
        map.insert(api.name.to_string(), i as u32);
    }
    map
}

pub fn import_count() -> u32 {
    api_registry().len() as u32
}

/// Builds the full module byte vector from the interned type table, the
/// import registry, and the compiled non-import functions (in final index
/// order — see `emitter::mod::emit`).
pub fn assemble(
    types: TypeTable,
    import_type_indices: &[u32],
    funcs: &[FuncEntry],
    memory_pages: u32,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"\0asm");
    out.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);

    let signatures = types.into_vec();
    write_section(&mut out, 1, &type_section(&signatures));
    write_section(&mut out, 2, &import_section(import_type_indices));
    write_section(&mut out, 3, &function_section(funcs));
    write_section(&mut out, 5, &memory_section(memory_pages));
    write_section(&mut out, 7, &export_section(funcs));
    write_section(&mut out, 10, &code_section(funcs));

    out
}

fn type_section(signatures: &[(Vec<WasmType>, Vec<WasmType>)]) -> Vec<u8> {
    let mut body = Vec::new();
    write_uleb128(&mut body, signatures.len() as u64);
    for (params, results) in signatures {
        body.push(0x60); // func type tag
        write_uleb128(&mut body, params.len() as u64);
        for p in params {
            body.push(p.encode_byte());
        }
        write_uleb128(&mut body, results.len() as u64);
        for r in results {
            body.push(r.encode_byte());
        }
    }
    body
}

fn import_section(import_type_indices: &[u32]) -> Vec<u8> {
    let apis = api_registry();
    let mut body = Vec::new();
    write_uleb128(&mut body, apis.len() as u64);
    for (api, type_idx) in apis.iter().zip(import_type_indices.iter()) {
        write_name(&mut body, "env");
        write_name(&mut body, api.name);
        body.push(0x00); // import kind: function
        write_uleb128(&mut body, *type_idx as u64);
    }
    body
}

/// Interns every import's `(params, results)` signature into `types`, in
/// registry order, and returns the resulting type indices — the caller must
/// do this *before* interning any user function's signature so the indices
/// recorded here line up with the ones baked into each `FuncEntry`.
pub fn intern_import_types(types: &mut TypeTable) -> Vec<u32> {
    api_registry()
        .iter()
        .map(|api| {
            let params: Vec<WasmType> = api.params.iter().map(|t| t.wasm_type()).collect();
            let results: Vec<WasmType> = api.returns.iter().map(|t| t.wasm_type()).collect();
            types.intern(params, results)
        })
        .collect()
}

fn function_section(funcs: &[FuncEntry]) -> Vec<u8> {
    let mut body = Vec::new();
    write_uleb128(&mut body, funcs.len() as u64);
    for f in funcs {
        write_uleb128(&mut body, f.type_index as u64);
    }
    body
}

fn memory_section(pages: u32) -> Vec<u8> {
    let mut body = Vec::new();
    write_uleb128(&mut body, 1); // one memory
    body.push(0x00); // limits: min only, no max
    write_uleb128(&mut body, pages as u64);
    body
}

fn export_section(funcs: &[FuncEntry]) -> Vec<u8> {
    let mut body = Vec::new();
    let import_base = import_count();
    let named: Vec<(&str, u32)> = funcs
        .iter()
        .enumerate()
        .filter_map(|(i, f)| f.export_name.as_deref().map(|name| (name, import_base + i as u32)))
        .collect();

    write_uleb128(&mut body, (named.len() + 1) as u64);
    write_name(&mut body, "memory");
    body.push(0x02); // export kind: memory
    write_uleb128(&mut body, 0);
    for (name, idx) in named {
        write_name(&mut body, name);
        body.push(0x00); // export kind: function
        write_uleb128(&mut body, idx as u64);
    }
    body
}

fn code_section(funcs: &[FuncEntry]) -> Vec<u8> {
    let mut body = Vec::new();
    write_uleb128(&mut body, funcs.len() as u64);
    for f in funcs {
        let mut entry = Vec::new();
        let runs = group_locals(&f.compiled.locals);
        write_uleb128(&mut entry, runs.len() as u64);
        for (count, ty) in &runs {
            write_uleb128(&mut entry, *count as u64);
            entry.push(ty.encode_byte());
        }
        entry.extend_from_slice(&f.compiled.code);
        entry.push(0x0b); // end
        write_uleb128(&mut body, entry.len() as u64);
        body.extend_from_slice(&entry);
    }
    body
}

/// Groups a flat local-type list into consecutive same-type runs (spec.md
/// §4.4 "Local allocation": "emitted as the function's locals vector grouped
/// by consecutive same-type runs").
fn group_locals(locals: &[WasmType]) -> Vec<(u32, WasmType)> {
    let mut runs = Vec::new();
    for &ty in locals {
        match runs.last_mut() {
            Some((count, last_ty)) if *last_ty == ty => *count += 1,
            _ => runs.push((1u32, ty)),
        }
    }
    runs
}

pub fn memory_pages(global_memory_size: u32, local_composite_bytes: u32) -> u32 {
    let total = global_memory_size as u64 + local_composite_bytes as u64 + WASM_PAGE_SIZE as u64;
    let pages = (total + WASM_PAGE_SIZE as u64 - 1) / WASM_PAGE_SIZE as u64;
    std::cmp::max(1, pages as u32)
}
