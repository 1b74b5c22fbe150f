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

//! Rust compiler backend.
//!
//! Every record of a validated descriptor becomes a struct with a
//! `Scope` implementation, exposing its scalar and string fields to
//! expressions, and a `Record` implementation holding the decoder and
//! encoder. Length and condition expressions are emitted as `static`
//! [`fig_runtime::Expression`] items evaluated at runtime.

use crate::ast;
use heck::ToShoutySnakeCase;
use quote::{format_ident, quote};
use std::collections::{BTreeSet, HashSet};

mod decoder;
mod encoder;
mod preamble;
mod types;

use decoder::FieldDecoder;
use encoder::FieldEncoder;

/// Errors raised while generating the code of a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("record `{record}`: `{name}` cannot be converted to a Rust identifier")]
    InvalidIdentifier { record: String, name: String },
    #[error("record `{record}`: field `{field}` has the invalid length {length}")]
    InvalidLength { record: String, field: String, length: i64 },
    #[error("undeclared record `{0}`")]
    UndeclaredRecord(String),
    #[error("record `{record}` cannot be generated as the reserved type `{name}`")]
    ReservedName { record: String, name: String },
}

/// Convert `text` to a Rust identifier.
/// Rust specific keywords are renamed for validity.
fn to_ident(record: &str, text: &str) -> Result<proc_macro2::Ident, SynthesisError> {
    let escaped = match text {
        // These keywords cannot be raw identifiers.
        "self" | "Self" | "super" | "crate" => format!("{text}_"),
        "as" | "break" | "const" | "continue" | "else" | "enum" | "extern" | "false" | "fn"
        | "for" | "if" | "impl" | "in" | "let" | "loop" | "match" | "mod" | "move" | "mut"
        | "pub" | "ref" | "return" | "static" | "struct" | "trait" | "true" | "type"
        | "unsafe" | "use" | "where" | "while" | "async" | "await" | "dyn" | "abstract"
        | "become" | "box" | "do" | "final" | "macro" | "override" | "priv" | "typeof"
        | "unsized" | "virtual" | "yield" | "try" => format!("r#{text}"),
        _ => text.to_owned(),
    };
    syn::parse_str::<syn::Ident>(&escaped).map_err(|_| SynthesisError::InvalidIdentifier {
        record: record.to_owned(),
        name: text.to_owned(),
    })
}

/// Return the identifier of the struct generated for a record.
pub fn record_ident(record: &str) -> Result<proc_macro2::Ident, SynthesisError> {
    let type_id = ast::to_type_id(record);
    if ast::is_reserved_type_id(&type_id) {
        return Err(SynthesisError::ReservedName { record: record.to_owned(), name: type_id });
    }
    to_ident(record, &type_id)
}

/// Return the identifier of the module generated for a record.
pub fn module_ident(record: &str) -> Result<proc_macro2::Ident, SynthesisError> {
    to_ident(record, &ast::to_field_id(record))
}

/// Length of a byte sequence field, as seen by the generated code.
pub(crate) enum FieldLength {
    /// The field is not a byte sequence.
    Unsized,
    Fixed(usize),
    /// The field requires manual completion.
    Manual,
    Expression { id: proc_macro2::Ident, context: bool },
}

pub(crate) struct Condition {
    pub id: proc_macro2::Ident,
    pub context: bool,
}

/// Field information shared by the decoder and encoder generators.
pub(crate) struct FieldContext<'d> {
    pub record: &'d str,
    pub field: &'d ast::Field,
    pub id: proc_macro2::Ident,
    pub field_type: ast::FieldType<'d>,
    pub length: FieldLength,
    pub condition: Option<Condition>,
}

impl FieldContext<'_> {
    /// Test if the field codec must be completed by hand.
    pub fn is_manual(&self) -> bool {
        matches!(self.length, FieldLength::Manual)
            || matches!(self.field_type, ast::FieldType::Custom(_))
    }

    /// Test if the field value is exposed to expressions.
    pub fn is_exposed(&self) -> bool {
        matches!(self.field_type, ast::FieldType::Scalar(_) | ast::FieldType::String)
    }
}

/// Test if an expression reads from the context record. Expressions
/// that cannot be compiled are assumed not to.
fn references_context(source: &str) -> bool {
    fig_runtime::Expr::parse(source).map(|expr| expr.references_context()).unwrap_or(false)
}

fn expression_ident(
    record: &str,
    field: &ast::Field,
    suffix: &str,
) -> Result<proc_macro2::Ident, SynthesisError> {
    // Parts are joined with a double underscore, which never occurs
    // within a part, so that distinct record and field pairs cannot
    // produce the same name.
    let name = format!(
        "{}__{}_{}",
        record.to_shouty_snake_case(),
        field.name.to_shouty_snake_case(),
        suffix.to_shouty_snake_case()
    );
    to_ident(record, &name)
}

fn field_context<'d>(
    descriptor: &'d ast::Descriptor,
    record: &'d str,
    field: &'d ast::Field,
) -> Result<FieldContext<'d>, SynthesisError> {
    let field_type = descriptor.field_type(field);
    let length = match (field.length(), field_type.is_sized()) {
        (_, false) => FieldLength::Unsized,
        (ast::Length::Fixed(n), true) => {
            FieldLength::Fixed(usize::try_from(n).ok().filter(|n| *n > 0).ok_or_else(|| {
                SynthesisError::InvalidLength {
                    record: record.to_owned(),
                    field: field.name.clone(),
                    length: n,
                }
            })?)
        }
        (ast::Length::Expression(source), true) => FieldLength::Expression {
            id: expression_ident(record, field, "length")?,
            context: references_context(source),
        },
        (ast::Length::Manual | ast::Length::Legacy | ast::Length::None, true) => {
            FieldLength::Manual
        }
    };
    let condition = match field.condition() {
        Some(source) => Some(Condition {
            id: expression_ident(record, field, "condition")?,
            context: references_context(source),
        }),
        None => None,
    };
    Ok(FieldContext { record, field, id: to_ident(record, &field.id())?, field_type, length, condition })
}

/// Support code required by the generated code of a record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Requirements {
    /// Values are read from the input buffer.
    pub reads: bool,
    /// Length or condition expressions are evaluated.
    pub expressions: bool,
    /// Nested record types.
    pub nested: BTreeSet<String>,
}

impl Requirements {
    /// Accumulate the requirements of the fields of a record.
    fn new(fields: &[FieldContext<'_>]) -> Requirements {
        let mut requirements = Requirements::default();
        for field in fields {
            requirements.reads |= field.field_type.is_scalar() || field.field_type.is_sized();
            requirements.expressions |= field.condition.is_some()
                || matches!(field.length, FieldLength::Expression { .. });
            if let ast::FieldType::Record(nested) = field.field_type {
                requirements.nested.insert(ast::to_type_id(nested));
            }
        }
        requirements
    }

    pub fn merge(&mut self, other: &Requirements) {
        self.reads |= other.reads;
        self.expressions |= other.expressions;
        self.nested.extend(other.nested.iter().cloned());
    }
}

/// Code generated for one record.
pub struct RecordCode {
    pub tokens: proc_macro2::TokenStream,
    pub requirements: Requirements,
}

/// Test if the record or one of its nested records has floating
/// point fields, which prevents deriving `Eq`.
fn has_float_fields<'d>(
    descriptor: &'d ast::Descriptor,
    record: &'d ast::Record,
    visited: &mut HashSet<&'d str>,
) -> bool {
    record.fields.iter().any(|field| match descriptor.field_type(field) {
        ast::FieldType::Scalar(scalar) => scalar.is_float(),
        ast::FieldType::Record(nested) if visited.insert(nested) => {
            has_float_fields(descriptor, &descriptor.records[nested], visited)
        }
        _ => false,
    })
}

fn field_doc(field: &ast::Field) -> Vec<String> {
    let mut doc = vec![];
    if !field.description.is_empty() {
        doc.push(format!(" {}", field.description));
    }
    match field.length() {
        ast::Length::Expression(length) => doc.push(format!(" Length: `{length}`.")),
        ast::Length::Manual => doc.push(" Length: requires manual completion.".to_owned()),
        _ => (),
    }
    if let Some(condition) = field.condition() {
        doc.push(format!(" Present when `{condition}`."));
    }
    if !field.tags.is_empty() {
        doc.push(format!(" Tags: {}.", field.tags));
    }
    doc
}

fn generate_expressions(fields: &[FieldContext<'_>]) -> proc_macro2::TokenStream {
    let mut tokens = quote! {};
    for field in fields {
        if let FieldLength::Expression { id, .. } = &field.length {
            let source = field.field.length.trim();
            tokens.extend(quote! { static #id: Expression = Expression::new(#source); });
        }
        if let (Some(Condition { id, .. }), Some(source)) = (&field.condition, field.field.condition()) {
            tokens.extend(quote! { static #id: Expression = Expression::new(#source); });
        }
    }
    tokens
}

fn generate_scope_impl(
    name: &proc_macro2::Ident,
    fields: &[FieldContext<'_>],
) -> proc_macro2::TokenStream {
    let arms = fields.iter().filter(|f| f.is_exposed()).map(|f| {
        let id = &f.id;
        let mut names = vec![f.field.name.clone()];
        if f.field.id() != f.field.name {
            names.push(f.field.id());
        }
        let value = match (&f.field_type, f.condition.is_some()) {
            (ast::FieldType::String, false) => quote! { Value::from(&self.#id) },
            (ast::FieldType::String, true) => quote! { Value::from(self.#id.clone().unwrap_or_default()) },
            (_, false) => quote! { Value::from(self.#id) },
            (_, true) => quote! { Value::from(self.#id.unwrap_or_default()) },
        };
        quote! { #(#names)|* => Some(#value), }
    });
    let arms = arms.collect::<Vec<_>>();

    if arms.is_empty() {
        quote! {
            impl Scope for #name {
                fn get(&self, _name: &str) -> Option<Value> {
                    None
                }
            }
        }
    } else {
        quote! {
            impl Scope for #name {
                fn get(&self, name: &str) -> Option<Value> {
                    match name {
                        #(#arms)*
                        _ => None,
                    }
                }
            }
        }
    }
}

/// Generate the declaration and codec of the selected record.
pub fn generate_record(
    descriptor: &ast::Descriptor,
    record_id: &str,
) -> Result<RecordCode, SynthesisError> {
    let (record_id, record) = descriptor
        .records
        .get_key_value(record_id)
        .ok_or_else(|| SynthesisError::UndeclaredRecord(record_id.to_owned()))?;
    let name = record_ident(record_id)?;
    let fields = record
        .fields
        .iter()
        .map(|field| field_context(descriptor, record_id, field))
        .collect::<Result<Vec<_>, _>>()?;
    let requirements = Requirements::new(&fields);

    let derives = if has_float_fields(descriptor, record, &mut HashSet::from([record_id.as_str()])) {
        quote! { #[derive(Debug, Clone, Default, PartialEq)] }
    } else {
        quote! { #[derive(Debug, Clone, Default, PartialEq, Eq)] }
    };
    let field_decls = fields
        .iter()
        .map(|f| {
            let id = &f.id;
            let doc = field_doc(f.field);
            let type_ = types::rust_type(f)?;
            Ok(quote! {
                #(#[doc = #doc])*
                pub #id: #type_
            })
        })
        .collect::<Result<Vec<_>, SynthesisError>>()?;

    let expressions = generate_expressions(&fields);
    let scope_impl = generate_scope_impl(&name, &fields);

    let mut decoder = FieldDecoder::new(format_ident!("buf"));
    let mut encoder = FieldEncoder::new(format_ident!("buf"));
    for field in &fields {
        decoder.add(field)?;
        encoder.add(field)?;
    }
    let uses_context = fields.iter().any(|f| {
        f.condition.is_some()
            || matches!(f.length, FieldLength::Expression { .. })
            || matches!(f.field_type, ast::FieldType::Record(_))
    });
    let context = if uses_context { format_ident!("context") } else { format_ident!("_context") };
    let unreachable = fields
        .iter()
        .any(FieldContext::is_manual)
        .then(|| quote! { #[allow(unreachable_code)] });
    let (buf_mut, record_mut) = if fields.is_empty() { (quote!(), quote!()) } else { (quote!(mut), quote!(mut)) };
    let encoded_len = encoder.size();
    let decoded = decoder.tokens;
    let encoded = encoder.tokens;
    let record_name = record_id.as_str();
    let doc = format!(" Record `{}` of the `{}` format.", record_id, descriptor.name);

    let tokens = quote! {
        #expressions

        #[doc = #doc]
        #derives
        pub struct #name {
            #(#field_decls,)*
        }

        #scope_impl

        impl Record for #name {
            const NAME: &'static str = #record_name;

            #unreachable
            fn decode_with<'a>(
                #buf_mut buf: &'a [u8],
                #context: Option<&dyn Scope>,
            ) -> Result<(Self, &'a [u8]), DecodeError> {
                let #record_mut record = Self::default();
                #decoded
                Ok((record, buf))
            }

            fn encoded_len(&self) -> usize {
                #encoded_len
            }

            #unreachable
            fn encode_with(
                &self,
                buf: &mut impl BufMut,
                #context: Option<&dyn Scope>,
            ) -> Result<(), EncodeError> {
                #encoded
                Ok(())
            }
        }
    };

    Ok(RecordCode { tokens, requirements })
}

/// Generate Rust code for all records of a descriptor, sorted by
/// name, in a single module.
///
/// The code is not formatted, use [`format_rust`] to get readable
/// source code.
pub fn generate_tokens(
    descriptor: &ast::Descriptor,
) -> Result<proc_macro2::TokenStream, SynthesisError> {
    let mut requirements = Requirements::default();
    let mut records = vec![];
    for (record_id, _) in descriptor.sorted_records() {
        let code = generate_record(descriptor, record_id)?;
        requirements.merge(&code.requirements);
        records.push(code.tokens);
    }
    // Nested records are declared in the same module.
    requirements.nested.clear();
    let preamble = preamble::generate(&requirements);
    Ok(quote! {
        #preamble
        #(#records)*
    })
}

/// Generate formatted Rust code for all records of a descriptor.
pub fn generate(descriptor: &ast::Descriptor) -> Result<String, SynthesisError> {
    Ok(preamble::header(descriptor) + &format_rust(generate_tokens(descriptor)?))
}

/// Generate the formatted content of the file holding the selected
/// record. Nested records are imported from the parent module.
pub fn generate_file(descriptor: &ast::Descriptor, record_id: &str) -> Result<String, SynthesisError> {
    let mut code = generate_record(descriptor, record_id)?;
    code.requirements.nested.remove(&ast::to_type_id(record_id));
    let preamble = preamble::generate(&code.requirements);
    let tokens = code.tokens;
    Ok(preamble::header(descriptor)
        + &format_rust(quote! {
            #preamble
            #tokens
        }))
}

/// Format generated code with `prettyplease`.
///
/// Formatting is best effort: if the code cannot be parsed the raw
/// token text is returned.
pub fn format_rust(tokens: proc_macro2::TokenStream) -> String {
    match syn::parse2::<syn::File>(tokens.clone()) {
        Ok(syntax_tree) => prettyplease::unparse(&syntax_tree),
        Err(err) => {
            log::warn!("could not format generated code: {}", err);
            tokens.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::generate_inline;
    use googletest::prelude::{assert_that, contains_substring, eq, not};
    use paste::paste;

    /// Create a unit test checking that the code generated for the
    /// descriptor `yaml` contains each of the `expected` snippets.
    macro_rules! test_codegen {
        ($name:ident, $yaml:expr, [$($expected:expr),* $(,)?]) => {
            paste! {
                #[test]
                fn [< test_ $name >]() {
                    let code = generate_inline($yaml);
                    println!("{code}");
                    $(assert_that!(code, contains_substring($expected));)*
                }
            }
        };
    }

    #[test]
    fn test_to_ident() {
        assert_eq!(to_ident("R", "width").unwrap().to_string(), "width");
        assert_eq!(to_ident("R", "type").unwrap().to_string(), "r#type");
        assert_eq!(to_ident("R", "self").unwrap().to_string(), "self_");
        assert_eq!(
            to_ident("R", "2d"),
            Err(SynthesisError::InvalidIdentifier { record: "R".to_owned(), name: "2d".to_owned() })
        );
        assert!(to_ident("R", "").is_err());
    }

    test_codegen!(
        scalar_fields,
        r#"
records:
  Header:
    fields:
      - name: Magic
        type: uint32
      - name: Scale
        type: float64
"#,
        [
            "#[derive(Debug, Clone, Default, PartialEq)]",
            "pub struct Header {",
            "pub magic: u32,",
            "pub scale: f64,",
            "record.magic = buf.get_u32_le();",
            "buf.put_u32_le(self.magic);",
            "buf.put_f64_le(self.scale);",
            "\"Magic\" | \"magic\" => Some(Value::from(self.magic)),",
            "const NAME: &'static str = \"Header\";",
        ]
    );

    test_codegen!(
        fixed_length_string,
        r#"
records:
  Header:
    fields:
      - name: signature
        type: string
        length: 2
"#,
        [
            "#[derive(Debug, Clone, Default, PartialEq, Eq)]",
            "pub signature: String,",
            "if self.signature.len() != 2 {",
            "EncodeError::InvalidFixedLength",
            "DecodeError::InvalidUtf8",
            "\"signature\" => Some(Value::from(&self.signature)),",
        ]
    );

    test_codegen!(
        expression_length,
        r#"
records:
  ImageData:
    fields:
      - name: Width
        type: uint32
      - name: Height
        type: uint32
      - name: BitsPerPixel
        type: uint16
      - name: Pixels
        type: bytes
        length: CalculatePaddedSize(self.Width, self.Height, self.BitsPerPixel)
"#,
        [
            "static IMAGE_DATA__PIXELS_LENGTH: Expression = Expression::new(",
            "IMAGE_DATA__PIXELS_LENGTH.length(&record, context)",
            "IMAGE_DATA__PIXELS_LENGTH.length(self, context)",
            "EncodeError::LengthMismatch",
            "pub pixels: Vec<u8>,",
        ]
    );

    test_codegen!(
        conditional_field,
        r#"
records:
  Block:
    fields:
      - name: flags
        type: uint8
      - name: extra
        type: uint32
        condition: self.flags & 1 != 0
"#,
        [
            "static BLOCK__EXTRA_CONDITION: Expression = Expression::new(\"self.flags & 1 != 0\");",
            "pub extra: Option<u32>,",
            "record.extra = Some(buf.get_u32_le());",
            "EncodeError::MissingConditionalField",
            "Value::from(self.extra.unwrap_or_default())",
        ]
    );

    test_codegen!(
        context_condition,
        r#"
records:
  Block:
    fields:
      - name: extra
        type: uint16
        condition: context.version >= 2
"#,
        ["if context.is_some() {", "self.extra.is_some()"]
    );

    test_codegen!(
        nested_record,
        r#"
records:
  Outer:
    fields:
      - name: header
        type: Inner
      - name: next
        type: Outer
        condition: self.header.more != 0
  Inner:
    fields:
      - name: more
        type: uint8
"#,
        [
            "pub header: Inner,",
            "pub next: Option<Box<Outer>>,",
            "Inner::decode_mut(&mut buf, context)?",
            "self.header.encode_with(buf, context)?;",
            "self.header.encoded_len()",
        ]
    );

    test_codegen!(
        manual_length,
        r#"
records:
  Block:
    fields:
      - name: payload
        type: bytes
        length: ...
      - name: palette
        type: RGBQuad
"#,
        [
            "#[allow(unreachable_code)]",
            "DecodeError::NotImplemented",
            "EncodeError::NotImplemented",
            "pub palette: Vec<u8>,",
            "Length: requires manual completion.",
        ]
    );

    test_codegen!(
        empty_record,
        r#"
records:
  Empty:
    fields: []
"#,
        [
            "pub struct Empty {}",
            "fn get(&self, _name: &str) -> Option<Value> {",
            "_context: Option<&dyn Scope>",
            "let record = Self::default();",
        ]
    );

    #[test]
    fn test_no_buf_import_without_reads() {
        let code = generate_inline(
            r#"
records:
  Outer:
    fields:
      - name: inner
        type: Inner
  Inner:
    fields: []
"#,
        );
        assert_that!(code, not(contains_substring("Buf,")));
        assert_that!(code, not(contains_substring("Expression")));
        assert_that!(code, contains_substring("use fig_runtime::bytes::BufMut;"));
    }

    #[test]
    fn test_records_sorted_by_name() {
        let code = generate_inline(
            r#"
records:
  Zeta:
    fields: []
  Alpha:
    fields: []
"#,
        );
        let alpha = code.find("pub struct Alpha").unwrap();
        let zeta = code.find("pub struct Zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_generated_code_is_deterministic() {
        // The generated code should be deterministic, to avoid
        // unnecessary rebuilds during incremental builds.
        let yaml = r#"
records:
  B:
    fields:
      - name: a
        type: A
      - name: size
        type: uint16
      - name: data
        type: bytes
        length: self.size
  A:
    fields:
      - name: x
        type: int8
"#;
        let first = generate_inline(yaml);
        for _ in 0..3 {
            assert_that!(generate_inline(yaml), eq(first.clone()));
        }
    }

    #[test]
    fn test_invalid_identifier() {
        let mut db = ast::SourceDatabase::new();
        let descriptor = crate::parser::parse_inline(
            &mut db,
            "test",
            "records:\n  R:\n    fields:\n      - name: 3d\n        type: uint8\n".to_owned(),
        )
        .unwrap();
        assert!(matches!(
            generate_record(&descriptor, "R"),
            Err(SynthesisError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_generate_file_imports_nested() {
        let mut db = ast::SourceDatabase::new();
        let descriptor = crate::parser::parse_inline(
            &mut db,
            "test",
            "records:\n  Outer:\n    fields:\n      - name: inner\n        type: inner_block\n  inner_block:\n    fields: []\n"
                .to_owned(),
        )
        .unwrap();
        let code = generate_file(&descriptor, "Outer").unwrap();
        assert_that!(code, contains_substring("use super::InnerBlock;"));
        assert_that!(code, contains_substring("pub inner: InnerBlock,"));
    }

    #[test]
    fn test_generate_file_skips_own_import() {
        let descriptor = crate::test_utils::parse_and_analyze(
            r#"
records:
  Chunk:
    fields:
      - name: more
        type: uint8
      - name: next
        type: Chunk
        condition: self.more != 0
"#,
        );
        let code = generate_file(&descriptor, "Chunk").unwrap();
        assert_that!(code, not(contains_substring("use super::Chunk;")));
        assert_that!(code, contains_substring("pub next: Option<Box<Chunk>>,"));
    }

    #[test]
    fn test_conditional_field_named_buf() {
        let code = generate_inline(
            r#"
records:
  Block:
    fields:
      - name: flags
        type: uint8
      - name: buf
        type: uint16
        condition: self.flags != 0
"#,
        );
        assert_that!(code, contains_substring("let value = self"));
        assert_that!(code, contains_substring("buf.put_u16_le(*value);"));
        assert_that!(code, not(contains_substring("let buf =")));
    }

    #[test]
    fn test_conditional_field_named_expected() {
        let code = generate_inline(
            r#"
records:
  Block:
    fields:
      - name: size
        type: uint8
      - name: expected
        type: bytes
        length: self.size
        condition: self.size != 0
"#,
        );
        assert_that!(code, contains_substring("if expected != value.len() {"));
        assert_that!(code, contains_substring("buf.put_slice(value.as_slice());"));
        assert_that!(code, not(contains_substring("let expected = self")));
    }

    #[test]
    fn test_reserved_record_name() {
        let mut db = ast::SourceDatabase::new();
        let descriptor = crate::parser::parse_inline(
            &mut db,
            "test",
            "records:\n  value:\n    fields:\n      - name: x\n        type: uint8\n".to_owned(),
        )
        .unwrap();
        assert_eq!(
            generate_record(&descriptor, "value").err(),
            Some(SynthesisError::ReservedName { record: "value".to_owned(), name: "Value".to_owned() })
        );
    }

    #[test]
    fn test_expression_names_are_distinct() {
        let code = generate_inline(
            r#"
records:
  A_B:
    fields:
      - name: n
        type: uint8
      - name: c
        type: bytes
        length: self.n
  A:
    fields:
      - name: n
        type: uint8
      - name: B_c
        type: bytes
        length: self.n
"#,
        );
        assert_that!(code, contains_substring("static A_B__C_LENGTH: Expression"));
        assert_that!(code, contains_substring("static A__B_C_LENGTH: Expression"));
    }
}
