//! Semantic diagnostics (spec.md §4.3, §7 "Name resolution" / "Type" /
//! "Semantic structural"). Each case compiles past parsing but must fail
//! analysis with an `analyze`-phase diagnostic.

use rlang::error::Phase;

fn analyze_errors(source: &str) -> Vec<rlang::error::Diagnostic> {
    let result = rlang::compile(source);
    assert!(!result.success, "expected analysis to fail for: {:?}", source);
    assert!(result.wasm.is_none());
    assert!(
        result.errors.iter().any(|e| e.phase == Phase::Analyze),
        "expected an analyze-phase error, got: {:?}",
        result.errors
    );
    result.errors
}

#[test]
fn missing_tick_is_rejected() {
    analyze_errors("robot \"T\"\nfunc helper() {}\n");
}

#[test]
fn tick_with_parameters_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick(x int) {}\n");
}

#[test]
fn tick_with_return_type_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() int { return 0 }\n");
}

#[test]
fn undefined_variable_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n debugInt(missing)\n}\n");
}

#[test]
fn undefined_function_call_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n doesNotExist()\n}\n");
}

#[test]
fn duplicate_global_declaration_is_rejected() {
    analyze_errors("robot \"T\"\nvar n int\nvar n float\nfunc tick() {}\n");
}

#[test]
fn assigning_mismatched_types_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n x := 1\n x = 2.0\n}\n");
}

#[test]
fn debug_of_bool_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n debug(true)\n}\n");
}

#[test]
fn break_outside_a_loop_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n break\n}\n");
}

#[test]
fn continue_outside_a_loop_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n continue\n}\n");
}

#[test]
fn unknown_event_name_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {}\non notAnEvent() {}\n");
}

#[test]
fn event_signature_mismatch_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {}\non hit(d int) {}\n");
}

#[test]
fn indexing_a_non_array_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n x := 1\n debugInt(x[0])\n}\n");
}

#[test]
fn field_access_on_non_struct_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n x := 1\n debugInt(x.y)\n}\n");
}

#[test]
fn wrong_argument_count_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n drive(1.0)\n}\n");
}

#[test]
fn assignment_to_non_lvalue_is_rejected() {
    analyze_errors("robot \"T\"\nfunc tick() {\n 1 = 2\n}\n");
}
