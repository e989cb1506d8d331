#![no_main]

use libfuzzer_sys::fuzz_target;
use shlink_ir::Shader;
use shlink_linker::{LinkOptions, Program, link_program};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    // Each `---` separated document is one translation unit.
    let mut prog = Program::new();
    for doc in source.split("\n---\n") {
        let Ok(mut shader) = toml::from_str::<Shader>(doc) else {
            return;
        };
        shader.populate_symbol_table();
        // Malformed handles are a front-end bug, not a link error.
        if !shlink_opt::validate_ir_tree(&shader).is_empty() {
            return;
        }
        prog.attach(shader);
    }

    // Linking any well-formed set of units must not panic, and the
    // status must agree with the log.
    link_program(&mut prog, &LinkOptions::default());
    assert_eq!(prog.link_status, !prog.info_log.has_errors());
});
