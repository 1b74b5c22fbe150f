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

//! YAML compiler backend.

use crate::ast;

/// Turn the descriptor into a YAML document.
///
/// Records keep their declaration order and fields their wire
/// order, so that the output can be loaded again.
pub fn generate(descriptor: &ast::Descriptor) -> Result<String, String> {
    serde_yaml::to_string(descriptor)
        .map_err(|err| format!("could not serialize descriptor '{}': {err}", descriptor.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analyzer, parser};
    use googletest::prelude::{assert_that, contains_substring, eq, not};

    #[test]
    fn test_reformed_descriptor_reloads() {
        let mut db = ast::SourceDatabase::new();
        let mut descriptor = parser::parse_inline(
            &mut db,
            "bmp",
            r#"
name: bmp
records:
  Header:
    fields:
      - name: Signature
        type: string
        length: 2
      - name: Extra
        type: bytes
        length: ...
"#
            .to_owned(),
        )
        .unwrap();
        analyzer::validate(&mut descriptor);

        let yaml = generate(&descriptor).unwrap();
        assert_that!(yaml, contains_substring("length: NEEDS_MANUAL_LENGTH"));
        assert_that!(yaml, not(contains_substring("...")));

        let reloaded = parser::parse_inline(&mut db, "bmp", yaml).unwrap();
        assert_that!(reloaded, eq(descriptor));
    }
}
