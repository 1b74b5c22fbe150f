// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Various utility functions used in tests.

use crate::{analyzer, ast, backends, parser};

/// Parse and validate an inline descriptor.
///
/// # Panics
///
/// Panics if the descriptor cannot be loaded or fails validation.
pub fn parse_and_analyze(yaml: &str) -> ast::Descriptor {
    let mut db = ast::SourceDatabase::new();
    let descriptor = parser::parse_inline(&mut db, "test", yaml.to_owned())
        .unwrap_or_else(|diagnostic| panic!("parsing failure: {}", diagnostic.message));
    analyzer::analyze(&descriptor).unwrap_or_else(|diagnostics| {
        let messages = diagnostics.diagnostics.iter().map(|d| d.message.clone()).collect::<Vec<_>>();
        panic!("analysis failure: {messages:?}")
    })
}

/// Generate the formatted Rust code of an inline descriptor.
pub fn generate_inline(yaml: &str) -> String {
    let descriptor = parse_and_analyze(yaml);
    backends::rust::generate(&descriptor)
        .unwrap_or_else(|err| panic!("synthesis failure: {err}"))
}
