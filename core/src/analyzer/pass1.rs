//! Pass 1: declaration collection (spec.md §4.3). Structs, then constants,
//! then globals, then user functions, then events, in that order — each
//! stage may only see what came before it, matching the source-order
//! resolution the spec requires ("previously declared structs", "references
//! to earlier constants").

use super::{
    registry::{api_registry, event_signature},
    AnalysisResult, ConstInfo, ConstValue, FuncInfo, Scope, SymbolInfo,
};
use crate::{
    ast::{ExprKind, Program, TypeNode},
    error::Diagnostics,
    types::{StructField, Type},
    util::Pos,
};

pub fn collect_declarations(program: &Program, errors: &mut Diagnostics) -> AnalysisResult {
    let mut result = AnalysisResult::default();

    collect_structs(program, &mut result, errors);
    collect_consts(program, &mut result, errors);
    collect_globals(program, &mut result, errors);
    seed_api_registry(&mut result);
    collect_funcs(program, &mut result, errors);
    collect_events(program, &mut result, errors);
    check_tick(program, &result, errors);

    result
}

pub(crate) fn resolve_type(
    node: &TypeNode,
    structs: &std::collections::HashMap<String, Type>,
    errors: &mut Diagnostics,
    pos: Pos,
) -> Type {
    match node {
        TypeNode::Int => Type::Int,
        TypeNode::Float => Type::Float,
        TypeNode::Bool => Type::Bool,
        TypeNode::Angle => Type::Angle,
        TypeNode::Array(elem, size) => Type::Array {
            size: *size,
            element: Box::new(resolve_type(elem, structs, errors, pos)),
        },
        TypeNode::Named(name) => match structs.get(name) {
            Some(ty) => ty.clone(),
            None => {
                errors.push(
                    crate::error::Phase::Analyze,
                    pos,
                    format!("unknown type '{}'", name),
                );
                Type::Void
            }
        },
    }
}

fn collect_structs(program: &Program, result: &mut AnalysisResult, errors: &mut Diagnostics) {
    for decl in &program.types {
        if result.structs.contains_key(&decl.name) {
            errors.push(
                crate::error::Phase::Analyze,
                decl.span.start,
                format!("duplicate struct declaration '{}'", decl.name),
            );
            continue;
        }
        let mut fields = Vec::new();
        let mut offset = 0u32;
        for (field_name, type_node) in &decl.fields {
            let ty = resolve_type(type_node, &result.structs, errors, decl.span.start);
            let size = ty.size();
            fields.push(StructField { name: field_name.clone(), ty, offset, size });
            offset += size;
        }
        result.structs.insert(
            decl.name.clone(),
            Type::Struct { name: decl.name.clone(), fields },
        );
    }
}

/// Accepts only the restricted constant-expression grammar spec.md §4.3
/// names: literals, unary minus on a numeric literal, and references to
/// earlier constants.
fn fold_const(
    expr: &crate::ast::Expr,
    consts: &std::collections::HashMap<String, ConstInfo>,
) -> Result<ConstValue, String> {
    match &expr.kind {
        ExprKind::Int(v) => Ok(ConstValue::Int(*v)),
        ExprKind::Float(v) => Ok(ConstValue::Float(*v)),
        ExprKind::Bool(v) => Ok(ConstValue::Bool(*v)),
        ExprKind::Group(inner) => fold_const(inner, consts),
        ExprKind::Ident(name) => consts
            .get(name)
            .map(|c| c.value)
            .ok_or_else(|| format!("'{}' is not a previously declared constant", name)),
        ExprKind::Unary(crate::ast::UnaryOp::Neg, inner) => match fold_const(inner, consts)? {
            ConstValue::Int(v) => Ok(ConstValue::Int(-v)),
            ConstValue::Float(v) => Ok(ConstValue::Float(-v)),
            ConstValue::Bool(_) => Err("unary '-' requires a numeric constant".to_string()),
        },
        _ => Err(
            "constant initializer must be a literal, a negation, or an earlier constant"
                .to_string(),
        ),
    }
}

fn const_type(value: &ConstValue) -> Type {
    match value {
        ConstValue::Int(_) => Type::Int,
        ConstValue::Float(_) => Type::Float,
        ConstValue::Bool(_) => Type::Bool,
    }
}

fn collect_consts(program: &Program, result: &mut AnalysisResult, errors: &mut Diagnostics) {
    for decl in &program.consts {
        if result.consts.contains_key(&decl.name) {
            errors.push(
                crate::error::Phase::Analyze,
                decl.span.start,
                format!("duplicate constant declaration '{}'", decl.name),
            );
            continue;
        }
        match fold_const(&decl.expr, &result.consts) {
            Ok(value) => {
                let ty = const_type(&value);
                result.consts.insert(decl.name.clone(), ConstInfo { value, ty });
            }
            Err(message) => errors.push(crate::error::Phase::Analyze, decl.span.start, message),
        }
    }
}

fn collect_globals(program: &Program, result: &mut AnalysisResult, errors: &mut Diagnostics) {
    // The first 64 bytes of linear memory are reserved scratch space
    // (spec.md §4.4 "Memory layout").
    let mut offset = 64u32;
    for decl in &program.globals {
        if result.symbols.contains_key(&decl.name) {
            errors.push(
                crate::error::Phase::Analyze,
                decl.span.start,
                format!("duplicate global declaration '{}'", decl.name),
            );
            continue;
        }
        let ty = resolve_type(&decl.ty, &result.structs, errors, decl.span.start);
        let size = ty.size();
        result.symbols.insert(
            decl.name.clone(),
            SymbolInfo { name: decl.name.clone(), ty, scope: Scope::Global, location: offset },
        );
        offset += size;
    }
    result.global_memory_size = offset;
}

fn seed_api_registry(result: &mut AnalysisResult) {
    for api in api_registry() {
        result.funcs.insert(
            api.name.to_string(),
            FuncInfo {
                name: api.name.to_string(),
                param_types: api.params,
                param_names: Vec::new(),
                return_types: api.returns,
                is_import: true,
                is_event: false,
                wasm_export_name: None,
            },
        );
    }
}

fn collect_funcs(program: &Program, result: &mut AnalysisResult, errors: &mut Diagnostics) {
    for decl in &program.funcs {
        if result.funcs.contains_key(&decl.name) {
            errors.push(
                crate::error::Phase::Analyze,
                decl.span.start,
                format!("duplicate function declaration '{}'", decl.name),
            );
            continue;
        }
        let param_types = decl
            .params
            .iter()
            .map(|p| resolve_type(&p.ty, &result.structs, errors, decl.span.start))
            .collect();
        let return_types = decl
            .return_types
            .iter()
            .map(|t| resolve_type(t, &result.structs, errors, decl.span.start))
            .collect();
        let wasm_export_name = match decl.name.as_str() {
            "tick" | "init" => Some(decl.name.clone()),
            _ => None,
        };
        result.funcs.insert(
            decl.name.clone(),
            FuncInfo {
                name: decl.name.clone(),
                param_types,
                param_names: decl.params.iter().map(|p| p.name.clone()).collect(),
                return_types,
                is_import: false,
                is_event: false,
                wasm_export_name,
            },
        );
    }
}

fn collect_events(program: &Program, result: &mut AnalysisResult, errors: &mut Diagnostics) {
    for decl in &program.events {
        let expected = match event_signature(&decl.name) {
            Some(sig) => sig,
            None => {
                errors.push(
                    crate::error::Phase::Analyze,
                    decl.span.start,
                    format!("unknown event '{}'", decl.name),
                );
                continue;
            }
        };
        let actual: Vec<Type> = decl
            .params
            .iter()
            .map(|p| resolve_type(&p.ty, &result.structs, errors, decl.span.start))
            .collect();
        if actual != expected {
            errors.push(
                crate::error::Phase::Analyze,
                decl.span.start,
                format!(
                    "event '{}' must take parameters ({}), found ({})",
                    decl.name,
                    describe_types(&expected),
                    describe_types(&actual),
                ),
            );
        }
        let export_name = format!("on_{}", decl.name);
        if result.funcs.contains_key(&export_name) {
            errors.push(
                crate::error::Phase::Analyze,
                decl.span.start,
                format!("duplicate event handler '{}'", decl.name),
            );
            continue;
        }
        result.funcs.insert(
            export_name.clone(),
            FuncInfo {
                name: export_name.clone(),
                param_types: expected,
                param_names: decl.params.iter().map(|p| p.name.clone()).collect(),
                return_types: Vec::new(),
                is_import: false,
                is_event: true,
                wasm_export_name: Some(export_name),
            },
        );
    }
}

fn describe_types(types: &[Type]) -> String {
    types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
}

fn check_tick(program: &Program, result: &AnalysisResult, errors: &mut Diagnostics) {
    match program.funcs.iter().find(|f| f.name == "tick") {
        None => errors.push(
            crate::error::Phase::Analyze,
            program.span.start,
            "program must declare a 'tick' function",
        ),
        Some(decl) => {
            if let Some(info) = result.funcs.get("tick") {
                if !info.param_types.is_empty() || !info.return_types.is_empty() {
                    errors.push(
                        crate::error::Phase::Analyze,
                        decl.span.start,
                        "'tick' must take no parameters and return no value",
                    );
                }
            }
        }
    }
}
