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

//! Format descriptor loader.
//!
//! The YAML text is first read into a generic [`serde_yaml::Value`]
//! tree. Field attribute keys are then normalized to lowercase and
//! each field is decoded into the typed [`ast::Field`]. The generic
//! tree never leaves this module.

use crate::ast;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files;
use serde_yaml::{Mapping, Value};

/// Field attribute keys matched case-insensitively.
const FIELD_KEYS: &[&str] = &["name", "type", "description", "length", "condition", "tags"];

struct Context<'a> {
    file: ast::FileId,
    name: &'a str,
    source: &'a str,
    line_starts: &'a [usize],
}

fn err_invalid<T>(context: &Context<'_>, path: &str, message: impl std::fmt::Display) -> Result<T, Diagnostic<ast::FileId>> {
    Err(Diagnostic::error()
        .with_message(format!("invalid format descriptor '{}' at {}: {}", context.name, path, message)))
}

/// Rewrite the field attribute keys of a YAML tree to lowercase.
/// Other keys are left untouched.
fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .into_iter()
                .map(|(key, value)| (normalize_key(key), normalize_keys(value)))
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(normalize_keys).collect()),
        value => value,
    }
}

fn normalize_key(key: Value) -> Value {
    match key {
        Value::String(s) if FIELD_KEYS.contains(&s.to_lowercase().as_str()) => {
            Value::String(s.to_lowercase())
        }
        key => key,
    }
}

/// Normalize the keys of a mapping without descending into its values.
fn normalize_toplevel(mapping: Mapping) -> Mapping {
    mapping.into_iter().map(|(key, value)| (normalize_key(key), value)).collect()
}

fn key_text(context: &Context<'_>, path: &str, key: Value) -> Result<String, Diagnostic<ast::FileId>> {
    ast::scalar_text::<serde_yaml::Error>(key).or_else(|e| err_invalid(context, path, e))
}

fn take_text(
    context: &Context<'_>,
    mapping: &mut Mapping,
    keys: &[&str],
) -> Result<Option<String>, Diagnostic<ast::FileId>> {
    for key in keys {
        if let Some(value) = mapping.remove(*key) {
            return match value {
                Value::Null => Ok(None),
                value => ast::scalar_text::<serde_yaml::Error>(value)
                    .map(Some)
                    .or_else(|e| err_invalid(context, key, e)),
            };
        }
    }
    Ok(None)
}

impl Context<'_> {
    fn range(&self, start: usize, end: usize) -> ast::SourceRange {
        ast::SourceRange {
            file: self.file,
            start: ast::SourceLocation::new(start, self.line_starts),
            end: ast::SourceLocation::new(end, self.line_starts),
        }
    }

    /// Iterate over the lines of the source with their byte offset,
    /// starting from `from`.
    fn lines_from(&self, from: usize) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.line_starts.iter().filter(move |start| **start >= from).map(|start| {
            let line = &self.source[*start..];
            (*start, line.split('\n').next().unwrap_or_default().trim_end())
        })
    }

    /// Locate the line declaring the record `name`. Best effort, used
    /// for diagnostic labels only.
    fn locate_record(&self, name: &str) -> Option<ast::SourceRange> {
        self.lines_from(0).find_map(|(start, line)| {
            let indent = line.len() - line.trim_start().len();
            let key = line.trim_start();
            let key = key.strip_suffix(':').or_else(|| key.split_once(": ").map(|(k, _)| k))?;
            (unquote(key) == name).then(|| self.range(start + indent, start + line.len()))
        })
    }

    /// Locate the line declaring the name of a field, looking after
    /// the offset `from`.
    fn locate_field(&self, from: usize, name: &str) -> Option<ast::SourceRange> {
        self.lines_from(from).find_map(|(start, line)| {
            let item = line.trim_start().trim_start_matches("- ").trim_start();
            let (key, value) = item.split_once(':')?;
            let indent = line.len() - line.trim_start().len();
            (key.trim().eq_ignore_ascii_case("name") && unquote(value.trim()) == name)
                .then(|| self.range(start + indent, start + line.len()))
        })
    }
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
        .unwrap_or(text)
}

fn parse_fields(
    context: &Context<'_>,
    record_name: &str,
    record_loc: ast::SourceRange,
    value: Value,
) -> Result<Vec<ast::Field>, Diagnostic<ast::FileId>> {
    let path = format!("records.{}", record_name);
    let mut mapping = match value {
        Value::Null => return Ok(vec![]),
        Value::Mapping(mapping) => mapping,
        _ => return err_invalid(context, &path, "expected a mapping with a 'fields' list"),
    };
    let items = match mapping.remove("fields") {
        None | Some(Value::Null) => vec![],
        Some(Value::Sequence(items)) => items,
        Some(_) => return err_invalid(context, &format!("{path}.fields"), "expected a list"),
    };

    let mut cursor = record_loc.start.offset;
    let mut fields = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let path = format!("{path}.fields[{index}]");
        let mut field: ast::Field = serde_yaml::from_value(normalize_keys(item))
            .or_else(|e| err_invalid(context, &path, e))?;
        field.loc = match context.locate_field(cursor, &field.name) {
            Some(loc) => {
                cursor = loc.end.offset;
                loc
            }
            None => record_loc,
        };
        fields.push(field);
    }
    Ok(fields)
}

/// Parse a descriptor from a string.
///
/// The source is added to the compilation database. Returns the
/// constructed descriptor, or a descriptive error naming the path of
/// the offending element.
pub fn parse_inline(
    sources: &mut ast::SourceDatabase,
    name: &str,
    source: String,
) -> Result<ast::Descriptor, Diagnostic<ast::FileId>> {
    let line_starts: Vec<_> = files::line_starts(&source).collect();
    let file = sources.add(name.to_owned(), source.clone());
    let context = Context { file, name, source: &source, line_starts: &line_starts };

    let root: Value = serde_yaml::from_str(&source).map_err(|e| {
        let diagnostic = Diagnostic::error()
            .with_message(format!("failed to parse input file '{}': {}", name, e));
        match e.location() {
            Some(loc) => diagnostic.with_labels(vec![Label::primary(file, loc.index()..loc.index())]),
            None => diagnostic,
        }
    })?;

    let mut root = match root {
        Value::Mapping(mapping) => normalize_toplevel(mapping),
        _ => return err_invalid(&context, "<root>", "expected a mapping"),
    };

    let mut descriptor = ast::Descriptor::new(file);
    descriptor.name = take_text(&context, &mut root, &["name"])?.unwrap_or_default();
    descriptor.description = take_text(&context, &mut root, &["description"])?.unwrap_or_default();
    descriptor.context_field_path =
        take_text(&context, &mut root, &["context_field_path", "versionFieldPath"])?;

    let records = match root.remove("records").or_else(|| root.remove("structs")) {
        None | Some(Value::Null) => Mapping::new(),
        Some(Value::Mapping(records)) => records,
        Some(_) => return err_invalid(&context, "records", "expected a mapping of records"),
    };
    for (key, value) in records {
        let record_name = key_text(&context, "records", key)?;
        let loc = context.locate_record(&record_name).unwrap_or_default();
        let fields = parse_fields(&context, &record_name, loc, value)?;
        descriptor.records.insert(record_name, ast::Record { fields, loc });
    }

    for (key, _) in root {
        log::debug!("{}: ignoring unknown key {:?}", name, key);
    }
    Ok(descriptor)
}

/// Parse a new source file.
///
/// The source file is fully read and added to the compilation
/// database. Returns the constructed descriptor, or a descriptive
/// error message in case of syntax error.
pub fn parse_file(
    sources: &mut ast::SourceDatabase,
    name: &str,
) -> Result<ast::Descriptor, Diagnostic<ast::FileId>> {
    let source = std::fs::read_to_string(name).map_err(|e| {
        Diagnostic::error().with_message(format!("failed to read input file '{}': {}", name, e))
    })?;
    parse_inline(sources, name, source)
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(text: &str) -> Result<ast::Descriptor, Diagnostic<ast::FileId>> {
        let mut db = ast::SourceDatabase::new();
        parse_inline(&mut db, "stdin", text.to_owned())
    }

    #[test]
    fn test_parse_descriptor() {
        let descriptor = parse(
            r#"
name: simple_bmp
description: Minimal bitmap
records:
  Header:
    fields:
      - name: Signature
        type: string
        length: 2
      - name: FileSize
        type: uint32
"#,
        )
        .unwrap();
        assert_eq!(descriptor.name, "simple_bmp");
        assert_eq!(descriptor.description, "Minimal bitmap");
        assert_eq!(descriptor.context_field_path, None);
        let header = &descriptor.records["Header"];
        assert_eq!(header.fields.len(), 2);
        assert_eq!(header.fields[0].name, "Signature");
        assert_eq!(header.fields[0].length, "2");
        assert_eq!(header.fields[1].type_, "uint32");
        assert_eq!(header.fields[1].condition, None);
    }

    #[test]
    fn test_normalize_field_keys() {
        let descriptor = parse(
            r#"
records:
  Type:
    fields:
      - Name: Width
        TYPE: uint32
        Description: pixels
        LENGTH: ""
        Condition: self.Flags != 0
        Tags: [geometry, size]
"#,
        )
        .unwrap();
        // Record names are not normalized.
        let field = &descriptor.records["Type"].fields[0];
        assert_eq!(field.name, "Width");
        assert_eq!(field.type_, "uint32");
        assert_eq!(field.description, "pixels");
        assert_eq!(field.condition.as_deref(), Some("self.Flags != 0"));
        assert_eq!(field.tags, "geometry, size");
    }

    #[test]
    fn test_legacy_keys() {
        let descriptor = parse(
            r#"
name: legacy
versionFieldPath: Header.Version
structs:
  B:
    fields: []
  A:
    fields:
"#,
        )
        .unwrap();
        assert_eq!(descriptor.context_field_path.as_deref(), Some("Header.Version"));
        // Insertion order is preserved.
        assert_eq!(descriptor.records.keys().collect::<Vec<_>>(), vec!["B", "A"]);
        assert!(descriptor.records["A"].fields.is_empty());
    }

    #[test]
    fn test_lenient_scalars() {
        let descriptor = parse(
            r#"
records:
  R:
    fields:
      - name: 42
        type: uint8
        length: 1.5
        condition: true
"#,
        )
        .unwrap();
        let field = &descriptor.records["R"].fields[0];
        assert_eq!(field.name, "42");
        assert_eq!(field.length, "1.5");
        assert_eq!(field.condition.as_deref(), Some("true"));
    }

    #[test]
    fn test_error_path() {
        let err = parse(
            r#"
records:
  Header:
    fields:
      - name: a
        type: uint8
      - name: b
        type: [uint8]
"#,
        )
        .unwrap_err();
        assert!(err.message.contains("records.Header.fields[1]"), "{}", err.message);
    }

    #[test]
    fn test_syntax_error_label() {
        let err = parse("records:\n  Header: [\n").unwrap_err();
        assert!(err.message.contains("failed to parse input file 'stdin'"));
        assert_eq!(err.labels.len(), 1);
    }

    #[test]
    fn test_field_locations() {
        let text = "records:\n  R:\n    fields:\n      - name: a\n        type: uint8\n      - name: b\n        type: uint8\n";
        let descriptor = parse(text).unwrap();
        let record = &descriptor.records["R"];
        assert_eq!(record.loc.start.line, 1);
        assert_eq!(record.fields[0].loc.start.line, 3);
        assert_eq!(record.fields[1].loc.start.line, 5);
    }

    #[test]
    fn test_invalid_root() {
        assert!(parse("- a\n- b\n").is_err());
        assert!(parse("records: 3\n").is_err());
    }
}
