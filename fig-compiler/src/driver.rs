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

//! Emission of the generated codecs to an output directory.
//!
//! Each record is written to its own module `<record>.rs`. A `mod.rs`
//! file declares the modules and re-exports the record types, which
//! lets nested records be imported with `use super::Record`.

use std::io;
use std::path::{Path, PathBuf};

use quote::quote;

use crate::ast;
use crate::backends::rust::{self, SynthesisError};
use crate::backends::yaml;

/// Name of the test scaffold module.
pub const TEST_MODULE: &str = "tests";

/// Outcome of the emission of a descriptor.
#[derive(Debug, Default)]
pub struct EmitSummary {
    /// Files written to the output directory, in emission order.
    pub written: Vec<PathBuf>,
    /// Records whose code could not be generated.
    pub failed: Vec<(String, SynthesisError)>,
}

impl EmitSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Return the name of the file holding the reformed descriptor.
pub fn descriptor_file_name(descriptor: &ast::Descriptor) -> String {
    let name = if descriptor.name.is_empty() { "format" } else { descriptor.name.as_str() };
    format!("{}.yaml", ast::to_field_id(name))
}

fn write(path: PathBuf, content: &str, summary: &mut EmitSummary) -> io::Result<()> {
    std::fs::write(&path, content)?;
    log::debug!("wrote {}", path.display());
    summary.written.push(path);
    Ok(())
}

/// Generate the `mod.rs` file declaring the record modules.
fn generate_mod_file(
    descriptor: &ast::Descriptor,
    records: &[&str],
    test_scaffold: bool,
) -> Result<String, SynthesisError> {
    let mut items = vec![];
    for record_id in records {
        let module = rust::module_ident(record_id)?;
        let name = rust::record_ident(record_id)?;
        items.push(quote! {
            mod #module;
            pub use #module::#name;
        });
    }
    let tests = test_scaffold.then(|| {
        let tests = quote::format_ident!("{}", TEST_MODULE);
        quote! { mod #tests; }
    });
    let tokens = quote! {
        #(#items)*
        #tests
    };
    Ok(format!(
        "// @generated by figc from the `{}` format descriptor.\n\n{}",
        descriptor.name,
        rust::format_rust(tokens)
    ))
}

/// Write the generated code of every record of a validated
/// descriptor to `out_dir`, which is created if needed. The reformed
/// descriptor is written to `out_dir/descriptor_file`.
///
/// Records are emitted sorted by name. A record whose code cannot be
/// generated is logged and reported in the summary, without
/// preventing the emission of the other records. I/O errors abort
/// the emission.
pub fn emit(
    descriptor: &ast::Descriptor,
    out_dir: &Path,
    descriptor_file: &str,
    test_scaffold: bool,
) -> io::Result<EmitSummary> {
    std::fs::create_dir_all(out_dir)?;
    let mut summary = EmitSummary::default();
    let mut modules = vec![];

    for (record_id, _) in descriptor.sorted_records() {
        let code = rust::module_ident(record_id)
            .and_then(|_| rust::generate_file(descriptor, record_id));
        match code {
            Ok(code) => {
                let path = out_dir.join(format!("{}.rs", ast::to_field_id(record_id)));
                write(path, &code, &mut summary)?;
                modules.push(record_id.as_str());
            }
            Err(err) => {
                log::error!("{}: failed to generate record `{}`: {}", descriptor.name, record_id, err);
                summary.failed.push((record_id.clone(), err));
            }
        }
    }

    if test_scaffold {
        match rust::test::generate_scaffold(descriptor) {
            Ok(code) => write(out_dir.join(format!("{TEST_MODULE}.rs")), &code, &mut summary)?,
            Err(err) => log::error!("{}: failed to generate the test scaffold: {}", descriptor.name, err),
        }
    }
    let with_tests = summary.written.iter().any(|path| path.ends_with(format!("{TEST_MODULE}.rs")));

    // Module declarations only fail for names already rejected above.
    let mod_file = generate_mod_file(descriptor, &modules, with_tests)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    write(out_dir.join("mod.rs"), &mod_file, &mut summary)?;

    let yaml = yaml::generate(descriptor).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    write(out_dir.join(descriptor_file), &yaml, &mut summary)?;

    log::info!(
        "{}: wrote {} files to {}, {} records failed",
        descriptor.name,
        summary.written.len(),
        out_dir.display(),
        summary.failed.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::parse_and_analyze;
    use googletest::prelude::{assert_that, contains_substring, eq};

    static BMP: &str = r#"
name: simple_bmp
records:
  FileHeader:
    fields:
      - name: Signature
        type: string
        length: 2
      - name: FileSize
        type: uint32
  InfoHeader:
    fields:
      - name: Width
        type: int32
      - name: Header
        type: FileHeader
"#;

    #[test]
    fn test_emit_records() {
        let descriptor = parse_and_analyze(BMP);
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("simple_bmp");

        let summary = emit(&descriptor, &out_dir, "simple_bmp.yaml", false).unwrap();
        assert!(summary.is_success());
        let names = summary
            .written
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_that!(
            names,
            eq(vec![
                "file_header.rs".to_owned(),
                "info_header.rs".to_owned(),
                "mod.rs".to_owned(),
                "simple_bmp.yaml".to_owned(),
            ])
        );

        let info_header = std::fs::read_to_string(out_dir.join("info_header.rs")).unwrap();
        assert_that!(info_header, contains_substring("use super::FileHeader;"));
        assert_that!(info_header, contains_substring("pub struct InfoHeader {"));

        let mod_file = std::fs::read_to_string(out_dir.join("mod.rs")).unwrap();
        assert_that!(mod_file, contains_substring("mod file_header;"));
        assert_that!(mod_file, contains_substring("pub use file_header::FileHeader;"));
        assert_that!(mod_file, contains_substring("pub use info_header::InfoHeader;"));
    }

    #[test]
    fn test_emit_continues_after_failure() {
        let descriptor = parse_and_analyze(
            r#"
records:
  Good:
    fields:
      - name: value
        type: uint8
  3rd:
    fields: []
"#,
        );
        let dir = tempfile::tempdir().unwrap();
        let summary = emit(&descriptor, dir.path(), "format.yaml", false).unwrap();
        assert!(!summary.is_success());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "3rd");
        assert!(dir.path().join("good.rs").exists());
        let mod_file = std::fs::read_to_string(dir.path().join("mod.rs")).unwrap();
        assert_that!(mod_file, contains_substring("pub use good::Good;"));
        assert!(dir.path().join("format.yaml").exists());
    }

    #[test]
    fn test_emit_test_scaffold() {
        let descriptor = parse_and_analyze(BMP);
        let dir = tempfile::tempdir().unwrap();
        let summary = emit(&descriptor, dir.path(), "bmp.yaml", true).unwrap();
        assert!(summary.written.contains(&dir.path().join("tests.rs")));
        let mod_file = std::fs::read_to_string(dir.path().join("mod.rs")).unwrap();
        assert_that!(mod_file, contains_substring("mod tests;"));
    }
}
