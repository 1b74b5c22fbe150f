#![no_main]

use fig_runtime::expr::{Env, Expr};
use fig_runtime::Value;
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

// Fuzz fig_runtime::expr::Expr::parse and Expr::eval.
fuzz_target!(|source: String| {
    let Ok(expr) = Expr::parse(&source) else {
        return;
    };
    let this = HashMap::from([
        ("Width".to_owned(), Value::from(2u32)),
        ("Flags".to_owned(), Value::from(1u8)),
        ("Name".to_owned(), Value::from("BM")),
    ]);
    let context = HashMap::from([("version".to_owned(), Value::from(2u8))]);
    let env = Env { this: &this, context: Some(&context) };
    let _ = expr.eval(&env);
    let _ = expr.length(&env);
    let _ = expr.condition(&env);
});
