//! `rlang`: lexer, parser, analyzer, and WASM emitter for the small
//! robot-control language this workspace compiles. [`compile`] is the single
//! public entry point (spec.md §6.1): it never panics or throws on
//! malformed input, instead returning a [`CompileResult`] whose `errors`
//! carry every diagnostic the relevant pipeline stage produced.

pub mod analyzer;
pub mod ast;
mod emitter;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod types;
pub mod util;

use error::Diagnostic;
use serde::Serialize;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
use wasm_bindgen::prelude::*;

/// The compiler's sole public output (spec.md §6.1). `wasm` is present iff
/// `success` is `true`; `errors` may still be non-empty (warnings) on
/// success, and is always non-empty on failure.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(all(target_arch = "wasm32", feature = "wasm"), wasm_bindgen(getter_with_clone))]
pub struct CompileResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wasm: Option<Vec<u8>>,
    pub errors: Vec<Diagnostic>,
    /// `true` when `success` is `true` but `errors` is non-empty — lets a
    /// host tell "compiled cleanly" from "compiled with warnings" without
    /// re-scanning `errors` (spec.md §6.1 already allows the two to coexist).
    pub warnings_only: bool,
}

fn failure(errors: Vec<Diagnostic>) -> CompileResult {
    CompileResult { success: false, wasm: None, errors, warnings_only: false }
}

/// The result of [`check`]: whether the source parses and analyzes cleanly,
/// and every diagnostic either stage produced. Carries no WASM module —
/// `check` never runs the emitter at all.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub success: bool,
    pub errors: Vec<Diagnostic>,
}

/// Runs only the front half of the pipeline: lex, parse, analyze. Unlike
/// [`compile`], this never invokes the emitter, so it's safe to call on a
/// program whose only problem is that it can't (or isn't meant to) be
/// lowered to WASM yet — a plain type-check.
pub fn check(source: &str) -> CheckResult {
    let tokens = lexer::lex(source);
    let (program, parse_errors) = parser::parse(tokens);
    if !parse_errors.is_empty() {
        return CheckResult { success: false, errors: parse_errors.into_vec() };
    }

    let (_, analyze_errors) = analyzer::analyze(&program);
    let success = analyze_errors.is_empty();
    CheckResult { success, errors: analyze_errors.into_vec() }
}

/// Runs the full pipeline: lex, parse, analyze, emit. Each stage gates the
/// next — a non-empty diagnostic list from parsing or analysis skips the
/// remaining stages entirely (spec.md §7 "Propagation policy"). The lexer
/// never fails, so `tokenize`-phase diagnostics are never produced here.
pub fn compile(source: &str) -> CompileResult {
    let tokens = lexer::lex(source);
    crate::debug!(eprintln!("tokens: {:?}", tokens));

    let (program, parse_errors) = parser::parse(tokens);
    crate::debug!(eprintln!("program: {:?}", program));
    if !parse_errors.is_empty() {
        return failure(parse_errors.into_vec());
    }

    let (analysis, analyze_errors) = analyzer::analyze(&program);
    crate::debug!(eprintln!("analysis: {:?}", analysis));
    if !analyze_errors.is_empty() {
        return failure(analyze_errors.into_vec());
    }

    let wasm = emitter::emit(&program, &analysis);
    crate::debug!(eprintln!("emitted {} bytes of wasm", wasm.len()));
    CompileResult { success: true, wasm: Some(wasm), errors: Vec::new(), warnings_only: false }
}

/// JS-facing entry point, present only in `wasm32` builds with the `wasm`
/// feature enabled (mirrors the teacher's `wasm_bindgen` boundary: a thin
/// wrapper that hands the host a serializable result rather than exposing
/// compiler internals directly).
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
#[wasm_bindgen(js_name = "compile")]
pub fn compile_js(source: &str) -> JsValue {
    JsValue::from_serde(&compile(source)).expect("CompileResult always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_program_compiles_to_a_well_formed_header() {
        let result = compile("robot \"Bot\"\nfunc tick() {\n}\n");
        assert!(result.success, "errors: {:?}", result.errors);
        let wasm = result.wasm.unwrap();
        assert_eq!(&wasm[0..4], b"\0asm");
        assert_eq!(&wasm[4..8], &[0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn parse_error_short_circuits_analysis_and_emission() {
        let result = compile("robot \"Bot\"\nfunc tick( {\n}\n");
        assert!(!result.success);
        assert!(result.wasm.is_none());
        assert!(!result.errors.is_empty());
        assert!(result.errors.iter().all(|e| e.phase == error::Phase::Parse));
    }

    #[test]
    fn missing_tick_is_an_analysis_error() {
        let result = compile("robot \"Bot\"\nfunc helper() {\n}\n");
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.phase == error::Phase::Analyze));
    }

    #[test]
    fn check_accepts_a_well_formed_program_without_emitting_anything() {
        let result = check("robot \"Bot\"\nfunc tick() {\n}\n");
        assert!(result.success, "errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn check_reports_analysis_errors_same_as_compile_but_never_panics() {
        // A program whose only problem is WASM-emission-shaped (a function
        // returning a composite value used in expression position) must
        // still be checkable without ever reaching the emitter.
        let result = check(
            "robot \"Bot\"\ntype Point struct {\n x int\n y int\n}\nfunc make() Point {\n p := Point{x: 1, y: 2}\n return p\n}\nfunc tick() {\n make()\n}\n",
        );
        assert!(result.success, "errors: {:?}", result.errors);
    }
}
