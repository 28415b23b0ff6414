//! Two-pass semantic analysis (spec.md §4.3): pass 1 collects every
//! declaration into resolved tables, pass 2 walks every function and event
//! body against those tables. The analyzer never panics on malformed user
//! source — every rule violation becomes a [`crate::error::Diagnostic`] and a
//! placeholder type, so one bad expression never hides errors in its
//! siblings (spec.md §4.3 "Failure semantics").

pub(crate) mod pass1;
mod pass2;
pub mod registry;

use crate::{
    ast::Program,
    error::Diagnostics,
    types::Type,
    util::ExprId,
};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Scope {
    Global,
    Local,
    Param,
}

#[derive(Clone, Debug)]
pub struct SymbolInfo {
    pub name: String,
    pub ty: Type,
    pub scope: Scope,
    /// Byte offset into linear memory for globals; an abstract per-function
    /// slot index for locals/params (the emitter computes its own WASM local
    /// indices independently — see `emitter::function`).
    pub location: u32,
}

#[derive(Clone, Debug)]
pub struct FuncInfo {
    pub name: String,
    pub param_types: Vec<Type>,
    pub param_names: Vec<String>,
    pub return_types: Vec<Type>,
    pub is_import: bool,
    pub is_event: bool,
    /// `Some` iff this function is exported: `tick`, `init`, or `on_<event>`.
    pub wasm_export_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

#[derive(Clone, Debug)]
pub struct ConstInfo {
    pub value: ConstValue,
    pub ty: Type,
}

#[derive(Clone, Debug)]
pub struct ExprInfo {
    pub ty: Type,
    pub is_lvalue: bool,
    pub is_const: bool,
    pub const_value: Option<ConstValue>,
}

#[derive(Clone, Debug, Default)]
pub struct AnalysisResult {
    pub expr_info: HashMap<ExprId, ExprInfo>,
    pub symbols: HashMap<String, SymbolInfo>,
    pub funcs: HashMap<String, FuncInfo>,
    pub structs: HashMap<String, Type>,
    pub consts: HashMap<String, ConstInfo>,
    pub global_memory_size: u32,
}

/// Runs both analysis passes over a parsed program. Always returns a result;
/// callers check the returned [`Diagnostics`] to decide whether to proceed
/// to code generation (spec.md §2, "Each stage halts downstream work if it
/// records any errors").
pub fn analyze(program: &Program) -> (AnalysisResult, Diagnostics) {
    let mut errors = Diagnostics::new();
    let mut result = pass1::collect_declarations(program, &mut errors);
    pass2::check_bodies(program, &mut result, &mut errors);
    (result, errors)
}
