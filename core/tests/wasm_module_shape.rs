//! Binary-shape invariants from spec.md §8.1 (#3, #6, #7, #8) and §4.4
//! "Module shape" / "Entry points", decoded with small hand-rolled
//! section-walking helpers rather than a WASM parsing crate — the emitter
//! itself is a from-scratch binary writer, so its test harness stays
//! consistent with that and reads the format back by hand too.

struct Section<'a> {
    id: u8,
    body: &'a [u8],
}

fn read_uleb128(bytes: &[u8], pos: &mut usize) -> u64 {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = bytes[*pos];
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    result
}

fn sections(wasm: &[u8]) -> Vec<Section<'_>> {
    let mut pos = 8; // past magic + version
    let mut out = Vec::new();
    while pos < wasm.len() {
        let id = wasm[pos];
        pos += 1;
        let len = read_uleb128(wasm, &mut pos) as usize;
        out.push(Section { id, body: &wasm[pos..pos + len] });
        pos += len;
    }
    out
}

fn export_names(wasm: &[u8]) -> Vec<String> {
    let export_section = sections(wasm).into_iter().find(|s| s.id == 7);
    let body = match export_section {
        Some(s) => s.body,
        None => return Vec::new(),
    };
    let mut pos = 0;
    let count = read_uleb128(body, &mut pos);
    let mut names = Vec::new();
    for _ in 0..count {
        let name_len = read_uleb128(body, &mut pos) as usize;
        let name = String::from_utf8(body[pos..pos + name_len].to_vec()).unwrap();
        pos += name_len;
        pos += 1; // export kind
        read_uleb128(body, &mut pos); // export index
        names.push(name);
    }
    names
}

fn compile_ok(source: &str) -> Vec<u8> {
    let result = rlang::compile(source);
    assert!(result.success, "errors: {:?}", result.errors);
    result.wasm.unwrap()
}

#[test]
fn header_is_the_wasm_magic_and_version() {
    let wasm = compile_ok("robot \"T\"\nfunc tick() {}\n");
    assert_eq!(&wasm[0..4], &[0x00, 0x61, 0x73, 0x6D]);
    assert_eq!(&wasm[4..8], &[0x01, 0x00, 0x00, 0x00]);
}

#[test]
fn sections_appear_in_ascending_id_order() {
    let wasm = compile_ok(
        "robot \"T\"\nvar n int = 1\nfunc helper() int { return n }\nfunc tick() {\n debugInt(helper())\n}\n",
    );
    let ids: Vec<u8> = sections(&wasm).iter().map(|s| s.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[test]
fn memory_is_always_exported() {
    let wasm = compile_ok("robot \"T\"\nfunc tick() {}\n");
    assert!(export_names(&wasm).contains(&"memory".to_string()));
}

#[test]
fn tick_is_exported_when_declared() {
    let wasm = compile_ok("robot \"T\"\nfunc tick() {}\n");
    assert!(export_names(&wasm).contains(&"tick".to_string()));
}

#[test]
fn init_is_not_exported_without_a_declaration_or_initializer() {
    let wasm = compile_ok("robot \"T\"\nfunc tick() {}\n");
    assert!(!export_names(&wasm).contains(&"init".to_string()));
}

#[test]
fn init_is_exported_when_a_global_has_an_initializer() {
    let wasm = compile_ok("robot \"T\"\nvar n int = 5\nfunc tick() {}\n");
    assert!(export_names(&wasm).contains(&"init".to_string()));
}

#[test]
fn init_is_exported_when_the_source_declares_it() {
    let wasm = compile_ok("robot \"T\"\nfunc init() {}\nfunc tick() {}\n");
    assert!(export_names(&wasm).contains(&"init".to_string()));
}

#[test]
fn event_handlers_are_exported_under_on_prefixed_names() {
    let wasm = compile_ok(
        "robot \"T\"\nfunc tick() {}\non scanned(a angle) {}\non bulletMiss() {}\n",
    );
    let names = export_names(&wasm);
    assert!(names.contains(&"on_scanned".to_string()));
    assert!(names.contains(&"on_bulletMiss".to_string()));
}

#[test]
fn helper_functions_are_not_exported() {
    let wasm = compile_ok(
        "robot \"T\"\nfunc helper() int { return 1 }\nfunc tick() {\n debugInt(helper())\n}\n",
    );
    assert!(!export_names(&wasm).contains(&"helper".to_string()));
}

#[test]
fn compilation_is_byte_for_byte_deterministic() {
    let source = "robot \"T\"\nvar n int = 1\nfunc tick() {\n n += 1\n debugInt(n)\n}\n";
    let a = compile_ok(source);
    let b = compile_ok(source);
    assert_eq!(a, b);
}
