//! WASM code generation (spec.md §4.4). Runs only once the analyzer has
//! produced zero errors. [`emit`] is the single entry point: it assigns
//! function indices, compiles every function/event body, synthesizes `init`
//! when needed, and assembles the final module bytes.

mod function;
mod layout;
mod leb128;
mod module;

use crate::{analyzer::AnalysisResult, ast::Program};
use function::FuncEmitter;
use module::FuncEntry;
use std::collections::HashMap;

pub fn emit(program: &Program, analysis: &AnalysisResult) -> Vec<u8> {
    let mut types = layout::TypeTable::default();
    let import_type_indices = module::intern_import_types(&mut types);

    let mut func_index: HashMap<String, u32> = module::build_function_index();
    let import_count = module::import_count();
    let mut next_index = import_count;
    for f in &program.funcs {
        func_index.insert(f.name.clone(), next_index);
        next_index += 1;
    }

    let user_declared_init = program.funcs.iter().any(|f| f.name == "init");
    let needs_init = user_declared_init || program.globals.iter().any(|g| g.init.is_some());
    let synthesize_init = needs_init && !user_declared_init;

    // Every function gets its own, non-overlapping slice of the local
    // composite area: two sibling functions must never be handed the same
    // addresses, since a caller's composite locals have to survive a call to
    // another function that also declares composite locals (see DESIGN.md,
    // "Local composite area non-reentrancy"). Bases are assigned by walking
    // functions in the same declaration order used for indexing and bumping
    // a running cursor by each function's own composite-local footprint.
    let mut composite_cursor = analysis.global_memory_size;
    let mut composite_bases: HashMap<String, u32> = HashMap::new();
    for f in &program.funcs {
        composite_bases.insert(f.name.clone(), composite_cursor);
        composite_cursor += layout::composite_locals_size(&f.body, analysis, &analysis.structs);
    }
    // A synthesized `init` has no user body, so it needs no composite-local
    // space of its own; it only ever claims the cursor position, not a range.
    let synthesized_init_base = composite_cursor;
    for e in &program.events {
        let export_name = format!("on_{}", e.name);
        composite_bases.insert(export_name, composite_cursor);
        composite_cursor += layout::composite_locals_size(&e.body, analysis, &analysis.structs);
    }
    let total_composite_bytes = composite_cursor - analysis.global_memory_size;

    let mut entries = Vec::new();

    for f in &program.funcs {
        let info = analysis.funcs.get(&f.name).expect("every declared function is registered");
        let param_wasm: Vec<_> = info.param_types.iter().map(|t| t.wasm_type()).collect();
        let result_wasm = layout::wasm_result(&info.return_types);
        let type_index = types.intern(param_wasm, result_wasm);
        let composite_base = *composite_bases.get(&f.name).expect("base assigned above");

        let fe = FuncEmitter::new(
            analysis,
            &func_index,
            &info.param_names,
            &info.param_types,
            info.return_types.clone(),
            composite_base,
        );
        let compiled = if f.name == "init" {
            fe.compile_init(program, Some(&f.body))
        } else {
            fe.compile_body(&f.body)
        };
        entries.push(FuncEntry { type_index, compiled, export_name: info.wasm_export_name.clone() });
    }

    if synthesize_init {
        let type_index = types.intern(vec![], vec![]);
        let fe = FuncEmitter::new(analysis, &func_index, &[], &[], vec![], synthesized_init_base);
        let compiled = fe.compile_init(program, None);
        entries.push(FuncEntry { type_index, compiled, export_name: Some("init".to_string()) });
    }

    for e in &program.events {
        let export_name = format!("on_{}", e.name);
        let info = analysis
            .funcs
            .get(&export_name)
            .expect("every declared event is registered under its on_<name> key");
        let param_wasm: Vec<_> = info.param_types.iter().map(|t| t.wasm_type()).collect();
        let type_index = types.intern(param_wasm, vec![]);
        let composite_base = *composite_bases.get(&export_name).expect("base assigned above");

        let fe = FuncEmitter::new(
            analysis,
            &func_index,
            &info.param_names,
            &info.param_types,
            vec![],
            composite_base,
        );
        let compiled = fe.compile_body(&e.body);
        entries.push(FuncEntry { type_index, compiled, export_name: info.wasm_export_name.clone() });
    }

    let pages = module::memory_pages(analysis.global_memory_size, total_composite_bytes);
    module::assemble(types, &import_type_indices, &entries, pages)
}
