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

//! FIG format descriptor loader, validator and codec generator.

pub mod analyzer;
pub mod ast;
pub mod backends;
pub mod config;
pub mod driver;
pub mod parser;
pub mod pipeline;
pub mod reset;
pub mod select;
#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validation_is_idempotent() {
        let src = r#"
name: wav
records:
  RiffHeader:
    fields:
      - name: ChunkId
        type: string
        length: 4
      - name: ChunkSize
        type: uint32
      - name: Extension
        type: bytes
        length: ...
      - name: Data
        type: bytes
        length: self.ChunkSize - 4
"#
        .to_owned();

        let mut sources = ast::SourceDatabase::new();
        let mut descriptor = parser::parse_inline(&mut sources, "wav", src).unwrap();
        let first = analyzer::validate(&mut descriptor);
        let reformed = descriptor.clone();
        let second = analyzer::validate(&mut descriptor);

        assert!(!first.has_errors());
        assert_eq!(first.reformed, 1);
        assert_eq!(second.reformed, 0);
        assert_eq!(descriptor, reformed);
        assert_eq!(
            backends::rust::generate(&descriptor).unwrap(),
            backends::rust::generate(&reformed).unwrap()
        );
    }
}
