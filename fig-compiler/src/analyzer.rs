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

use codespan_reporting::diagnostic::{Diagnostic, Severity};
use codespan_reporting::files;
use codespan_reporting::term;
use codespan_reporting::term::termcolor;
use fig_runtime::expr::{Expr, ScopeKind};
use std::collections::HashMap;
use std::fmt;

use crate::ast::*;

/// List of unique errors reported as analyzer diagnostics.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    MissingFieldName = 1,
    DuplicateFieldIdentifier = 2,
    MissingFieldType = 3,
    MissingLength = 4,
    InvalidFixedLength = 5,
    EmptyCondition = 6,
    RecursiveRecord = 7,
    ReservedRecordName = 8,
}

/// List of warnings reported as analyzer diagnostics.
/// Warnings never cause the analysis to fail.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WarningCode {
    ReformedLength = 1,
    UnverifiedExpression = 2,
    ForwardReference = 3,
    IgnoredLength = 4,
    CustomType = 5,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "E{}", *self as u16)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        format!("{}", code)
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "W{}", *self as u16)
    }
}

impl From<WarningCode> for String {
    fn from(code: WarningCode) -> Self {
        format!("{}", code)
    }
}

/// Aggregate analyzer diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic<FileId>>,
}

/// Outcome of the validation of a descriptor.
#[derive(Debug, Default)]
pub struct Report {
    /// Number of fields accepted without modification.
    pub valid: usize,
    /// Number of fields whose attributes were reformed.
    pub reformed: usize,
    /// Errors and warnings, in walk order.
    pub diagnostics: Diagnostics,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn push(&mut self, diagnostic: Diagnostic<FileId>) {
        self.diagnostics.push(diagnostic)
    }

    fn err_or<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn emit(
        &self,
        sources: &SourceDatabase,
        writer: &mut dyn termcolor::WriteColor,
    ) -> Result<(), files::Error> {
        let config = term::Config::default();
        for d in self.diagnostics.iter() {
            term::emit(writer, &config, sources, d)?;
        }
        Ok(())
    }
}

impl Report {
    /// Iterate over the error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic<FileId>> {
        self.diagnostics.diagnostics.iter().filter(|d| d.severity >= Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic<FileId>> {
        self.diagnostics.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

fn warning(code: WarningCode, message: String, field: &Field) -> Diagnostic<FileId> {
    log::warn!("{}", message);
    Diagnostic::warning().with_code(code).with_message(message).with_labels(vec![field.loc.primary()])
}

/// Statically check a length or condition expression. Failures are
/// reported as warnings: the expression is still evaluated at runtime.
fn check_expression(
    role: &str,
    source: &str,
    record_id: &str,
    field: &Field,
    declared: &[&Field],
    diagnostics: &mut Diagnostics,
) {
    let expr = match Expr::parse(source).and_then(|expr| expr.check_functions().map(|_| expr)) {
        Ok(expr) => expr,
        Err(err) => {
            diagnostics.push(warning(
                WarningCode::UnverifiedExpression,
                format!(
                    "{} expression `{}` of {}.{} cannot be verified statically: {}",
                    role, source, record_id, field.name, err
                ),
                field,
            ));
            return;
        }
    };

    for (scope, name) in expr.fields() {
        let known = declared.iter().any(|f| f.name == name || f.id() == to_field_id(name));
        if scope == ScopeKind::This && !known {
            diagnostics.push(warning(
                WarningCode::ForwardReference,
                format!(
                    "{} expression of {}.{} references `{}`, which is not declared before it",
                    role, record_id, field.name, name
                ),
                field,
            ));
        }
    }
}

/// Validate a single field. Returns true if the field is valid.
fn check_field(
    descriptor: &Descriptor,
    record_id: &str,
    field: &Field,
    declared: &[&Field],
    diagnostics: &mut Diagnostics,
) -> bool {
    let mut valid = true;
    let field_type = descriptor.field_type(field);

    match field.length() {
        Length::None | Length::Manual | Length::Legacy => (),
        Length::Fixed(size) if field_type.is_sized() && size <= 0 => {
            diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::InvalidFixedLength)
                    .with_message(format!(
                        "{} field `{}.{}` has the invalid length {}",
                        field_type.kind(),
                        record_id,
                        field.name,
                        size
                    ))
                    .with_labels(vec![field.loc.primary()])
                    .with_notes(vec!["hint: fixed lengths are positive byte counts".to_owned()]),
            );
            valid = false;
        }
        Length::Fixed(_) => (),
        Length::Expression(source) if field_type.is_sized() => {
            check_expression("length", source, record_id, field, declared, diagnostics)
        }
        Length::Expression(_) => (),
    }

    match field_type {
        FieldType::String | FieldType::Bytes if field.length() == Length::None => {
            diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::MissingLength)
                    .with_message(format!(
                        "{} field `{}.{}` requires a length",
                        field_type.kind(),
                        record_id,
                        field.name
                    ))
                    .with_labels(vec![field.loc.primary()])
                    .with_notes(vec![format!(
                        "hint: use a byte count, an expression, or `{}`",
                        MANUAL_LENGTH
                    )]),
            );
            valid = false;
        }
        FieldType::String | FieldType::Bytes => (),
        FieldType::Scalar(_) | FieldType::Record(_) | FieldType::Custom(_)
            if field.length() != Length::None =>
        {
            diagnostics.push(warning(
                WarningCode::IgnoredLength,
                format!(
                    "{} field `{}.{}` of type `{}` has the length `{}`, it will be ignored",
                    field_type.kind(),
                    record_id,
                    field.name,
                    field.type_,
                    field.length
                ),
                field,
            ))
        }
        FieldType::Scalar(_) | FieldType::Record(_) | FieldType::Custom(_) => (),
    }

    if let FieldType::Custom(type_id) = field_type {
        diagnostics.push(warning(
            WarningCode::CustomType,
            format!(
                "field `{}.{}` has the custom type `{}`, its codec requires manual completion",
                record_id, field.name, type_id
            ),
            field,
        ))
    }

    match field.condition() {
        Some("") => {
            diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::EmptyCondition)
                    .with_message(format!(
                        "conditional field `{}.{}` has an empty condition",
                        record_id, field.name
                    ))
                    .with_labels(vec![field.loc.primary()]),
            );
            valid = false;
        }
        Some(condition) => {
            check_expression("condition", condition, record_id, field, declared, diagnostics)
        }
        None => (),
    }

    if !field.tags.is_empty() {
        log::info!("field `{}.{}` has tags: `{}`", record_id, field.name, field.tags);
    }

    valid
}

/// Validate the fields of a record. `reformed` lists the indices of
/// the fields reformed in this pass.
fn check_record(
    descriptor: &Descriptor,
    record_id: &str,
    record: &Record,
    reformed: &[usize],
    report: &mut Report,
) {
    let mut declared: Vec<&Field> = vec![];
    let mut identifiers: HashMap<String, &Field> = HashMap::new();

    let type_id = to_type_id(record_id);
    if is_reserved_type_id(&type_id) {
        report.diagnostics.push(
            Diagnostic::error()
                .with_code(ErrorCode::ReservedRecordName)
                .with_message(format!(
                    "record `{}` would be generated as `{}`, which is reserved",
                    record_id, type_id
                ))
                .with_labels(vec![record.loc.primary()]),
        );
    }

    for (index, field) in record.fields.iter().enumerate() {
        if field.name.trim().is_empty() {
            report.diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::MissingFieldName)
                    .with_message(format!("field #{} of `{}` has no name", declared.len(), record_id))
                    .with_labels(vec![field.loc.primary()]),
            );
            declared.push(field);
            continue;
        }

        let mut valid = true;
        if let Some(prev) = identifiers.insert(field.id(), field) {
            report.diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::DuplicateFieldIdentifier)
                    .with_message(format!(
                        "redeclaration of field identifier `{}` in `{}`",
                        field.name, record_id
                    ))
                    .with_labels(vec![
                        field.loc.primary(),
                        prev.loc
                            .secondary()
                            .with_message(format!("`{}` is first declared here", prev.name)),
                    ]),
            );
            valid = false;
        }

        if field.type_.trim().is_empty() {
            report.diagnostics.push(
                Diagnostic::error()
                    .with_code(ErrorCode::MissingFieldType)
                    .with_message(format!("field `{}.{}` is missing a type", record_id, field.name))
                    .with_labels(vec![field.loc.primary()]),
            );
            declared.push(field);
            continue;
        }

        valid &= check_field(descriptor, record_id, field, &declared, &mut report.diagnostics);
        if valid && !reformed.contains(&index) {
            report.valid += 1;
        }
        declared.push(field);
    }
}

/// Check that records do not nest themselves through unconditional
/// fields, which would make their encoding infinite.
fn check_recursion(descriptor: &Descriptor, diagnostics: &mut Diagnostics) {
    enum Mark {
        Temporary,
        Permanent,
    }
    #[derive(Default)]
    struct Context<'d> {
        visited: HashMap<&'d str, Mark>,
    }

    fn dfs<'d>(
        descriptor: &'d Descriptor,
        record_id: &'d str,
        record: &'d Record,
        context: &mut Context<'d>,
        diagnostics: &mut Diagnostics,
    ) {
        match context.visited.get(record_id) {
            Some(Mark::Permanent) => return,
            Some(Mark::Temporary) => {
                diagnostics.push(
                    Diagnostic::error()
                        .with_code(ErrorCode::RecursiveRecord)
                        .with_message(format!("recursive declaration of record `{}`", record_id))
                        .with_labels(vec![record.loc.primary()]),
                );
                return;
            }
            None => (),
        }

        // Start visiting current record.
        context.visited.insert(record_id, Mark::Temporary);

        for field in record.fields.iter().filter(|f| !f.is_conditional()) {
            if let FieldType::Record(nested_id) = descriptor.field_type(field) {
                if let Some((nested_id, nested)) = descriptor.records.get_key_value(nested_id) {
                    dfs(descriptor, nested_id, nested, context, diagnostics);
                }
            }
        }

        // Done visiting current record.
        context.visited.insert(record_id, Mark::Permanent);
    }

    let mut context = Default::default();
    for (record_id, record) in &descriptor.records {
        dfs(descriptor, record_id, record, &mut context, diagnostics);
    }
}

/// Validate the descriptor, reforming legacy length placeholders in
/// place. Errors and warnings are collected in the returned report.
pub fn validate(descriptor: &mut Descriptor) -> Report {
    let mut report = Report::default();
    let mut reformed: HashMap<String, Vec<usize>> = HashMap::new();

    for (record_id, record) in descriptor.records.iter_mut() {
        for (index, field) in record.fields.iter_mut().enumerate() {
            if field.length() == Length::Legacy {
                reformed.entry(record_id.clone()).or_default().push(index);
                field.length = MANUAL_LENGTH.to_owned();
                report.reformed += 1;
                report.diagnostics.push(warning(
                    WarningCode::ReformedLength,
                    format!(
                        "field `{}.{}` had the length `{}`, replaced with `{}`",
                        record_id, field.name, LEGACY_LENGTH, MANUAL_LENGTH
                    ),
                    field,
                ));
            }
        }
    }

    for (record_id, record) in &descriptor.records {
        let reformed = reformed.get(record_id).map(Vec::as_slice).unwrap_or_default();
        check_record(descriptor, record_id, record, reformed, &mut report);
    }
    check_recursion(descriptor, &mut report.diagnostics);

    if report.reformed > 0 {
        log::info!("{}: made {} value reformation(s)", descriptor.name, report.reformed);
    }
    report
}

/// Validate the descriptor and return its reformed copy.
/// All errors are reported at once, warnings are logged and dropped.
pub fn analyze(descriptor: &Descriptor) -> Result<Descriptor, Diagnostics> {
    let mut descriptor = descriptor.clone();
    let report = validate(&mut descriptor);
    let errors = Diagnostics { diagnostics: report.errors().cloned().collect() };
    errors.err_or(descriptor)
}

#[cfg(test)]
mod test {
    use crate::analyzer;
    use crate::ast;
    use crate::parser::parse_inline;
    use codespan_reporting::term::termcolor;

    use googletest::prelude::{assert_that, eq};

    macro_rules! raises {
        ($code:ident, $text:literal) => {{
            let mut db = ast::SourceDatabase::new();
            let file = parse_inline(&mut db, "stdin", $text.to_owned()).expect("parsing failure");
            let result = analyzer::analyze(&file);
            assert!(matches!(result, Err(_)));
            let diagnostics = result.err().unwrap();
            let mut buffer = termcolor::Buffer::no_color();
            let _ = diagnostics.emit(&db, &mut buffer);
            println!("{}", std::str::from_utf8(buffer.as_slice()).unwrap());
            assert_eq!(diagnostics.diagnostics.len(), 1);
            assert_eq!(diagnostics.diagnostics[0].code, Some(analyzer::ErrorCode::$code.into()));
        }};
    }

    macro_rules! valid {
        ($text:literal) => {{
            let mut db = ast::SourceDatabase::new();
            let file = parse_inline(&mut db, "stdin", $text.to_owned()).expect("parsing failure");
            assert!(analyzer::analyze(&file).is_ok());
        }};
    }

    macro_rules! warns {
        ($code:ident, $text:literal) => {{
            let mut db = ast::SourceDatabase::new();
            let mut file =
                parse_inline(&mut db, "stdin", $text.to_owned()).expect("parsing failure");
            let report = analyzer::validate(&mut file);
            assert!(!report.has_errors());
            let code: String = analyzer::WarningCode::$code.into();
            assert!(
                report.warnings().any(|d| d.code.as_ref() == Some(&code)),
                "expected warning {}",
                code
            );
        }};
    }

    #[test]
    fn test_missing_field_name() {
        raises!(
            MissingFieldName,
            r#"
records:
  A:
    fields:
      - type: uint8
"#
        );
    }

    #[test]
    fn test_duplicate_field_identifier() {
        raises!(
            DuplicateFieldIdentifier,
            r#"
records:
  A:
    fields:
      - name: x
        type: uint8
      - name: x
        type: uint16
"#
        );

        // Names are compared after conversion to Rust identifiers.
        raises!(
            DuplicateFieldIdentifier,
            r#"
records:
  A:
    fields:
      - name: pixelCount
        type: uint8
      - name: pixel_count
        type: uint16
"#
        );
    }

    #[test]
    fn test_missing_field_type() {
        raises!(
            MissingFieldType,
            r#"
records:
  A:
    fields:
      - name: x
        length: ...
"#
        );
    }

    #[test]
    fn test_missing_length() {
        raises!(
            MissingLength,
            r#"
records:
  A:
    fields:
      - name: x
        type: string
"#
        );

        raises!(
            MissingLength,
            r#"
records:
  A:
    fields:
      - name: x
        type: "[]byte"
"#
        );
    }

    #[test]
    fn test_invalid_fixed_length() {
        raises!(
            InvalidFixedLength,
            r#"
records:
  A:
    fields:
      - name: x
        type: string
        length: 0
"#
        );

        raises!(
            InvalidFixedLength,
            r#"
records:
  A:
    fields:
      - name: x
        type: byte-sequence
        length: -4
"#
        );
    }

    #[test]
    fn test_empty_condition() {
        raises!(
            EmptyCondition,
            r#"
records:
  A:
    fields:
      - name: x
        type: uint8
        condition: "  "
"#
        );
    }

    #[test]
    fn test_recursive_record() {
        raises!(
            RecursiveRecord,
            r#"
records:
  A:
    fields:
      - name: a
        type: A
"#
        );

        raises!(
            RecursiveRecord,
            r#"
records:
  A:
    fields:
      - name: b
        type: B
  B:
    fields:
      - name: a
        type: A
"#
        );

        // Conditional nesting terminates.
        valid!(
            r#"
records:
  A:
    fields:
      - name: more
        type: uint8
      - name: next
        type: A
        condition: self.more != 0
"#
        );
    }

    #[test]
    fn test_reserved_record_name() {
        raises!(
            ReservedRecordName,
            r#"
records:
  Record:
    fields:
      - name: x
        type: uint8
"#
        );

        // Names are compared after conversion to Rust identifiers.
        raises!(
            ReservedRecordName,
            r#"
records:
  decode_error:
    fields:
      - name: code
        type: uint16
"#
        );

        valid!(
            r#"
records:
  Records:
    fields:
      - name: count
        type: uint8
"#
        );
    }

    #[test]
    fn test_valid_descriptor() {
        valid!(
            r#"
name: simple_bmp
records:
  Header:
    fields:
      - name: Signature
        type: string
        length: 2
      - name: FileSize
        type: uint32
  ImageData:
    fields:
      - name: Width
        type: uint32
      - name: Height
        type: uint32
      - name: BitsPerPixel
        type: uint16
      - name: Pixels
        type: byte-sequence
        length: CalculatePaddedSize(self.Width, self.Height, self.BitsPerPixel)
"#
        );

        // Empty records are legal.
        valid!(
            r#"
records:
  Empty:
    fields: []
"#
        );
    }

    #[test]
    fn test_errors_are_batched() {
        let mut db = ast::SourceDatabase::new();
        let file = parse_inline(
            &mut db,
            "stdin",
            r#"
records:
  A:
    fields:
      - name: x
        type: string
      - type: uint8
  B:
    fields:
      - name: y
        type: bytes
        length: 0
"#
            .to_owned(),
        )
        .unwrap();
        let diagnostics = analyzer::analyze(&file).unwrap_err();
        assert_that!(diagnostics.diagnostics.len(), eq(3));
    }

    #[test]
    fn test_warnings() {
        warns!(
            UnverifiedExpression,
            r#"
records:
  A:
    fields:
      - name: x
        type: string
        length: self.size +
"#
        );

        warns!(
            UnverifiedExpression,
            r#"
records:
  A:
    fields:
      - name: size
        type: uint8
      - name: x
        type: string
        length: Unknown(self.size)
"#
        );

        warns!(
            ForwardReference,
            r#"
records:
  A:
    fields:
      - name: x
        type: string
        length: self.size
      - name: size
        type: uint8
"#
        );

        warns!(
            IgnoredLength,
            r#"
records:
  A:
    fields:
      - name: x
        type: uint32
        length: 4
"#
        );

        warns!(
            CustomType,
            r#"
records:
  A:
    fields:
      - name: palette
        type: RGBQuad
"#
        );
    }

    #[test]
    fn test_reform_legacy_length() {
        let mut db = ast::SourceDatabase::new();
        let mut file = parse_inline(
            &mut db,
            "stdin",
            r#"
records:
  A:
    fields:
      - name: size
        type: uint8
      - name: data
        type: bytes
        length: "..."
"#
            .to_owned(),
        )
        .unwrap();

        let report = analyzer::validate(&mut file);
        assert_that!(report.reformed, eq(1));
        assert_that!(report.valid, eq(1));
        assert!(!report.has_errors());
        assert_eq!(file.records["A"].fields[1].length, ast::MANUAL_LENGTH);

        // Validation is idempotent.
        let report = analyzer::validate(&mut file);
        assert_that!(report.reformed, eq(0));
        assert_that!(report.valid, eq(2));
        assert!(!report.has_errors());
        assert_eq!(file.records["A"].fields[1].length, ast::MANUAL_LENGTH);
    }

    #[test]
    fn test_analyze_returns_reformed_copy() {
        let mut db = ast::SourceDatabase::new();
        let file = parse_inline(
            &mut db,
            "stdin",
            r#"
records:
  A:
    fields:
      - name: data
        type: string
        length: ...
"#
            .to_owned(),
        )
        .unwrap();
        let reformed = analyzer::analyze(&file).unwrap();
        assert_eq!(file.records["A"].fields[0].length, "...");
        assert_eq!(reformed.records["A"].fields[0].length, ast::MANUAL_LENGTH);
    }
}
