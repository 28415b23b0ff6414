//! Shared layout bookkeeping used by both the module builder and per-function
//! codegen: WASM function-type interning (spec.md §4.4 "Determinism": "type
//! signatures are interned in first-seen order") and the local-composite-area
//! sizing prepass (spec.md §4.4 "Memory layout").

use crate::{
    analyzer::AnalysisResult,
    ast::{Block, Stmt},
    types::{Type, WasmType},
};
use std::collections::HashMap;

/// Interns `(params, results)` WASM function-type signatures in first-seen
/// order and hands back a stable index for each.
#[derive(Default)]
pub struct TypeTable {
    signatures: Vec<(Vec<WasmType>, Vec<WasmType>)>,
}

impl TypeTable {
    pub fn intern(&mut self, params: Vec<WasmType>, results: Vec<WasmType>) -> u32 {
        if let Some(idx) = self.signatures.iter().position(|(p, r)| *p == params && *r == results) {
            return idx as u32;
        }
        self.signatures.push((params, results));
        (self.signatures.len() - 1) as u32
    }

    pub fn into_vec(self) -> Vec<(Vec<WasmType>, Vec<WasmType>)> {
        self.signatures
    }
}

/// A function's single WASM result type. Source functions may declare more
/// than one return value; only the first becomes the WASM result (WASM 1.0
/// function types carry at most one). Extra return values are written to the
/// reserved scratch region `[0, 64)` and read back by the caller — see
/// `function::emit_call_multi_return`.
pub fn wasm_result(return_types: &[Type]) -> Vec<WasmType> {
    match return_types.first() {
        Some(ty) if *ty != Type::Void => vec![ty.wasm_type()],
        _ => vec![],
    }
}

/// Conservatively sums the byte size of every composite (struct/array) local
/// a function body declares, in declaration order. The local-composite area
/// is monotonically growing (design notes, "Composite locals") — bytes are
/// never reclaimed when a declaration's scope ends, so a straight sum over
/// the whole body is exact, not just an upper bound.
pub fn composite_locals_size(body: &Block, analysis: &AnalysisResult, structs: &HashMap<String, Type>) -> u32 {
    let mut total = 0u32;
    sum_block(body, analysis, structs, &mut total);
    total
}

fn sum_block(block: &Block, analysis: &AnalysisResult, structs: &HashMap<String, Type>, total: &mut u32) {
    for stmt in &block.stmts {
        sum_stmt(stmt, analysis, structs, total);
    }
}

fn sum_stmt(stmt: &Stmt, analysis: &AnalysisResult, structs: &HashMap<String, Type>, total: &mut u32) {
    match stmt {
        Stmt::Block(b) => sum_block(b, analysis, structs, total),
        Stmt::Local(decl) => {
            let ty = crate::analyzer::pass1::resolve_type(
                &decl.ty,
                structs,
                &mut crate::error::Diagnostics::new(),
                decl.span.start,
            );
            if ty.is_composite() {
                *total += ty.size();
            }
        }
        Stmt::ShortDecl { names, exprs, .. } => {
            if names.len() == exprs.len() {
                for expr in exprs {
                    if let Some(info) = analysis.expr_info.get(&expr.id) {
                        if info.ty.is_composite() {
                            *total += info.ty.size();
                        }
                    }
                }
            }
        }
        Stmt::If { then_block, else_branch, .. } => {
            sum_block(then_block, analysis, structs, total);
            if let Some(e) = else_branch {
                sum_stmt(e, analysis, structs, total);
            }
        }
        Stmt::For { init, post, body, .. } => {
            if let Some(init) = init {
                sum_stmt(init, analysis, structs, total);
            }
            sum_block(body, analysis, structs, total);
            if let Some(post) = post {
                sum_stmt(post, analysis, structs, total);
            }
        }
        Stmt::Switch { cases, default, .. } => {
            for (_, body) in cases {
                sum_block(body, analysis, structs, total);
            }
            if let Some(default) = default {
                sum_block(default, analysis, structs, total);
            }
        }
        Stmt::Assign { .. }
        | Stmt::Return { .. }
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Expr(_) => {}
    }
}
