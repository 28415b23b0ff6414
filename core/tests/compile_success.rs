//! End-to-end scenarios from spec.md §8.3: compile to WASM, instantiate
//! against the fixed host import registry with `wasmi`, run the exported
//! entry points, and assert on the externally observable host calls.

use wasmi::{Caller, Engine, Linker, Module, Store};

#[derive(Default)]
struct HostState {
    debug_ints: Vec<i32>,
    debug_floats: Vec<f32>,
}

fn link_host_imports(linker: &mut Linker<HostState>) {
    linker.func_wrap("env", "drive", |_: Caller<'_, HostState>, _speed: f32, _heading: f32| {}).unwrap();
    linker.func_wrap("env", "stop", |_: Caller<'_, HostState>| {}).unwrap();
    linker.func_wrap("env", "turn", |_: Caller<'_, HostState>, _heading: f32| {}).unwrap();
    linker.func_wrap("env", "fire", |_: Caller<'_, HostState>, _power: f32| {}).unwrap();
    linker.func_wrap("env", "aimGun", |_: Caller<'_, HostState>, _heading: f32| {}).unwrap();
    linker.func_wrap("env", "gunHeading", |_: Caller<'_, HostState>| -> f32 { 0.0 }).unwrap();
    linker.func_wrap("env", "scan", |_: Caller<'_, HostState>| {}).unwrap();
    linker.func_wrap("env", "aimRadar", |_: Caller<'_, HostState>, _heading: f32| {}).unwrap();
    linker.func_wrap("env", "radarHeading", |_: Caller<'_, HostState>| -> f32 { 0.0 }).unwrap();
    linker.func_wrap("env", "health", |_: Caller<'_, HostState>| -> f32 { 100.0 }).unwrap();
    linker.func_wrap("env", "x", |_: Caller<'_, HostState>| -> f32 { 0.0 }).unwrap();
    linker.func_wrap("env", "y", |_: Caller<'_, HostState>| -> f32 { 0.0 }).unwrap();
    linker.func_wrap("env", "heading", |_: Caller<'_, HostState>| -> f32 { 0.0 }).unwrap();
    linker.func_wrap("env", "speed", |_: Caller<'_, HostState>| -> f32 { 0.0 }).unwrap();
    linker.func_wrap("env", "arenaWidth", |_: Caller<'_, HostState>| -> f32 { 800.0 }).unwrap();
    linker.func_wrap("env", "arenaHeight", |_: Caller<'_, HostState>| -> f32 { 600.0 }).unwrap();
    linker.func_wrap("env", "random", |_: Caller<'_, HostState>| -> f32 { 0.0 }).unwrap();
    linker.func_wrap("env", "randomInt", |_: Caller<'_, HostState>, bound: i32| -> i32 {
        if bound > 0 { 0 } else { 0 }
    }).unwrap();
    linker.func_wrap("env", "sin", |_: Caller<'_, HostState>, heading: f32| -> f32 { heading.sin() }).unwrap();
    linker.func_wrap("env", "cos", |_: Caller<'_, HostState>, heading: f32| -> f32 { heading.cos() }).unwrap();
    linker.func_wrap("env", "sqrt", |_: Caller<'_, HostState>, v: f32| -> f32 { v.sqrt() }).unwrap();
    linker.func_wrap("env", "abs", |_: Caller<'_, HostState>, v: f32| -> f32 { v.abs() }).unwrap();
    linker.func_wrap("env", "debugInt", |mut caller: Caller<'_, HostState>, v: i32| {
        caller.data_mut().debug_ints.push(v);
    }).unwrap();
    linker.func_wrap("env", "debugFloat", |mut caller: Caller<'_, HostState>, v: f32| {
        caller.data_mut().debug_floats.push(v);
    }).unwrap();
    linker.func_wrap("env", "debugBool", |_: Caller<'_, HostState>, _v: i32| {}).unwrap();
}

fn instantiate(wasm: &[u8]) -> (Store<HostState>, wasmi::Instance) {
    let engine = Engine::default();
    let module = Module::new(&engine, wasm).expect("emitted module should be valid wasm");
    let mut store = Store::new(&engine, HostState::default());
    let mut linker = Linker::new(&engine);
    link_host_imports(&mut linker);
    let instance = linker
        .instantiate(&mut store, &module)
        .expect("instantiation should succeed against the fixed import set")
        .start(&mut store)
        .expect("module has no start function to run");
    (store, instance)
}

fn compile_ok(source: &str) -> Vec<u8> {
    let result = rlang::compile(source);
    assert!(result.success, "errors: {:?}", result.errors);
    result.wasm.unwrap()
}

fn call_init_if_present(store: &mut Store<HostState>, instance: &wasmi::Instance) {
    if let Some(init) = instance.get_typed_func::<(), ()>(&mut *store, "init").ok() {
        init.call(&mut *store, ()).expect("init should not trap");
    }
}

#[test]
fn minimal_robot_ticks_without_trapping_or_calling_imports() {
    let wasm = compile_ok("robot \"T\"\nfunc tick() {}\n");
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).expect("tick should not trap");
    assert!(store.data().debug_ints.is_empty());
}

#[test]
fn arithmetic_and_debug_prints_fourteen() {
    let wasm = compile_ok(
        "robot \"T\"\nfunc tick(){\n x := 2 + 3 * 4\n debugInt(x)\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![14]);
}

#[test]
fn i32_addition_wraps_on_overflow() {
    let wasm = compile_ok(
        "robot \"T\"\nfunc tick(){\n x := 2147483647\n debugInt(x + 1)\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![-2147483648]);
}

#[test]
fn false_and_short_circuits_without_evaluating_the_right_side() {
    let wasm = compile_ok(
        "robot \"T\"\nvar called int\nfunc se() bool {\n called = 1\n return true\n}\nfunc tick(){\n if false && se() {\n debugInt(99)\n}\n debugInt(called)\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![0]);
}

#[test]
fn for_loop_break_and_continue_sum_to_eight() {
    let wasm = compile_ok(
        "robot \"T\"\nfunc tick(){\n sum := 0\n for i := 0; i < 5; i += 1 {\n if i == 2 {\n continue\n}\n sum += i\n if i == 4 {\n break\n}\n}\n debugInt(sum)\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![8]);
}

#[test]
fn event_handler_mutates_a_global_observed_by_tick() {
    let wasm = compile_ok(
        "robot \"T\"\nvar n int\non hit(d float, b angle){\n n = n + 1\n}\nfunc tick(){\n debugInt(n)\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let on_hit = instance.get_typed_func::<(f32, f32), ()>(&store, "on_hit").unwrap();
    on_hit.call(&mut store, (10.0, 0.0)).unwrap();
    on_hit.call(&mut store, (10.0, 0.0)).unwrap();
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![2]);
}

#[test]
fn out_of_bounds_array_write_traps() {
    let wasm = compile_ok("robot \"T\"\nvar a [5]int\nfunc tick(){\n a[5] = 1\n}\n");
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    assert!(tick.call(&mut store, ()).is_err(), "expected a trap on out-of-bounds write");
}

#[test]
fn struct_fields_and_array_elements_round_trip_through_memory() {
    let wasm = compile_ok(
        "robot \"T\"\ntype Point struct {\n x int\n y int\n}\nfunc tick(){\n p := Point{x: 3, y: 4}\n p.x = p.x + p.y\n debugInt(p.x)\n arr := [1, 2, 3]\n arr[1] = 9\n debugInt(arr[1])\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![7, 9]);
}

#[test]
fn global_initializers_run_before_the_first_tick() {
    let wasm = compile_ok(
        "robot \"T\"\nvar total int = 10\nfunc tick(){\n debugInt(total)\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![10]);
}

#[test]
fn function_returning_a_struct_can_be_captured_field_accessed_and_discarded() {
    let wasm = compile_ok(
        "robot \"T\"\ntype Point struct {\n x int\n y int\n}\nfunc make(a int, b int) Point {\n p := Point{x: a, y: b}\n return p\n}\nfunc tick(){\n q := make(5, 6)\n debugInt(q.x + q.y)\n debugInt(make(1, 1).x)\n make(2, 2)\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![11, 1]);
}

#[test]
fn sibling_functions_get_independent_composite_local_storage() {
    // `helper`'s composite local must not alias `tick`'s: `tick`'s own
    // struct has to survive the call to `helper` untouched.
    let wasm = compile_ok(
        "robot \"T\"\ntype Point struct {\n x int\n y int\n}\nfunc helper(){\n tmp := Point{x: 99, y: 99}\n debugInt(tmp.x)\n}\nfunc tick(){\n p := Point{x: 1, y: 2}\n helper()\n debugInt(p.x)\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![99, 1]);
}

#[test]
fn multi_return_function_binds_both_values_via_the_scratch_region() {
    let wasm = compile_ok(
        "robot \"T\"\nfunc divmod(a int, b int) int, int {\n return a / b, a % b\n}\nfunc tick(){\n q, r := divmod(17, 5)\n debugInt(q)\n debugInt(r)\n}\n",
    );
    let (mut store, instance) = instantiate(&wasm);
    call_init_if_present(&mut store, &instance);
    let tick = instance.get_typed_func::<(), ()>(&store, "tick").unwrap();
    tick.call(&mut store, ()).unwrap();
    assert_eq!(store.data().debug_ints, vec![3, 2]);
}
