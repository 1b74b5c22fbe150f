#![no_main]

use fig_compiler::{analyzer, ast, backends, parser};
use libfuzzer_sys::fuzz_target;

// Fuzz fig_compiler::backends::rust::generate.
fuzz_target!(|source: String| {
    let mut sources = ast::SourceDatabase::new();
    let Ok(descriptor) = parser::parse_inline(&mut sources, "input.yaml", source) else {
        return;
    };
    let Ok(analyzed) = analyzer::analyze(&descriptor) else {
        return;
    };
    let _ = backends::rust::generate(&analyzed);
});
