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

use codespan_reporting::diagnostic;
use codespan_reporting::files;
use heck::{ToSnakeCase, ToUpperCamelCase};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// File identifier.
/// References a source file in the source database.
pub type FileId = usize;

/// Source database.
/// Stores the source file contents for reference.
pub type SourceDatabase = files::SimpleFiles<String, String>;

/// Reserved length token marking a field whose length must be
/// completed by hand.
pub const MANUAL_LENGTH: &str = "NEEDS_MANUAL_LENGTH";

/// Legacy length placeholder, reformed to [`MANUAL_LENGTH`] by the
/// validator.
pub const LEGACY_LENGTH: &str = "...";

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceLocation {
    /// Byte offset into the file (counted from zero).
    pub offset: usize,
    /// Line number (counted from zero).
    pub line: usize,
    /// Column number (counted from zero)
    pub column: usize,
}

#[derive(Default, Copy, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub file: FileId,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

/// Fixed width numeric types, all encoded little-endian.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScalarType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// Classification of a field type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType<'d> {
    Scalar(ScalarType),
    String,
    Bytes,
    /// Another record of the same descriptor.
    Record(&'d str),
    /// Any other type name. Requires manual completion.
    Custom(&'d str),
}

/// Classification of a field length attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Length<'d> {
    None,
    /// Integer byte count. Zero and negative values are kept so that
    /// the validator can reject them.
    Fixed(i64),
    Manual,
    Legacy,
    Expression(&'d str),
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Field {
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "text")]
    pub type_: String,
    #[serde(default, deserialize_with = "text", skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "text", skip_serializing_if = "String::is_empty")]
    pub length: String,
    /// A null condition is treated as absent, a blank one is kept so
    /// that the validator can reject it.
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, deserialize_with = "tags", skip_serializing_if = "String::is_empty")]
    pub tags: String,
    #[serde(skip)]
    pub loc: SourceRange,
}

#[derive(Clone, Default, Serialize)]
pub struct Record {
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub loc: SourceRange,
}

#[derive(Clone, Default, Serialize)]
pub struct Descriptor {
    pub name: String,
    pub description: String,
    /// Dotted path to the field of a previously decoded record that
    /// selects the variant of this format. Documentary only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_field_path: Option<String>,
    pub records: IndexMap<String, Record>,
    #[serde(skip)]
    pub file: FileId,
}

/// Render a YAML scalar as text: numbers and booleans are accepted
/// and printed, null is the empty string.
pub(crate) fn scalar_text<E: serde::de::Error>(value: serde_yaml::Value) -> Result<String, E> {
    match value {
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Tagged(tagged) => scalar_text(tagged.value),
        serde_yaml::Value::Sequence(_) => Err(E::custom("expected a scalar, found a sequence")),
        serde_yaml::Value::Mapping(_) => Err(E::custom("expected a scalar, found a mapping")),
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    scalar_text(serde_yaml::Value::deserialize(deserializer)?)
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(None),
        value => scalar_text(value).map(Some),
    }
}

/// Tags are free text. A list of scalars is joined with commas.
fn tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Sequence(items) => Ok(items
            .into_iter()
            .map(scalar_text::<D::Error>)
            .collect::<Result<Vec<String>, D::Error>>()?
            .join(", ")),
        value => scalar_text(value),
    }
}

/// Return the Rust field identifier derived from a declared field name.
pub fn to_field_id(name: &str) -> String {
    name.to_snake_case()
}

/// Return the Rust type identifier derived from a declared record name.
pub fn to_type_id(name: &str) -> String {
    name.to_upper_camel_case()
}

/// Type names referenced by the generated code, which records cannot
/// take without hiding them.
const RESERVED_TYPE_IDS: &[&str] = &[
    "Box",
    "Buf",
    "BufMut",
    "DecodeError",
    "Default",
    "EncodeError",
    "Expression",
    "Option",
    "Record",
    "Result",
    "Scope",
    "String",
    "Value",
    "Vec",
];

/// Return true if the Rust type identifier is reserved by the
/// generated code.
pub fn is_reserved_type_id(type_id: &str) -> bool {
    RESERVED_TYPE_IDS.contains(&type_id)
}

impl SourceLocation {
    /// Construct a new source location.
    ///
    /// The `line_starts` indicates the byte offsets where new lines
    /// start in the file. The first element should thus be `0` since
    /// every file has at least one line starting at offset `0`.
    pub fn new(offset: usize, line_starts: &[usize]) -> SourceLocation {
        let mut loc = SourceLocation { offset, line: 0, column: offset };
        for (line, start) in line_starts.iter().enumerate() {
            if *start > offset {
                break;
            }
            loc = SourceLocation { offset, line, column: offset - start };
        }
        loc
    }
}

impl SourceRange {
    pub fn primary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::primary(self.file, self.start.offset..self.end.offset)
    }
    pub fn secondary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::secondary(self.file, self.start.offset..self.end.offset)
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}:{}-{}", self.start.line, self.start.column, self.end.column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

impl fmt::Debug for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRange").finish_non_exhaustive()
    }
}

impl ScalarType {
    pub fn from_name(name: &str) -> Option<ScalarType> {
        Some(match name {
            "uint8" => ScalarType::U8,
            "uint16" => ScalarType::U16,
            "uint32" => ScalarType::U32,
            "uint64" => ScalarType::U64,
            "int8" => ScalarType::I8,
            "int16" => ScalarType::I16,
            "int32" => ScalarType::I32,
            "int64" => ScalarType::I64,
            "float32" => ScalarType::F32,
            "float64" => ScalarType::F64,
            _ => return None,
        })
    }

    /// Width of the encoded value in bytes.
    pub fn width(&self) -> usize {
        match self {
            ScalarType::U8 | ScalarType::I8 => 1,
            ScalarType::U16 | ScalarType::I16 => 2,
            ScalarType::U32 | ScalarType::I32 | ScalarType::F32 => 4,
            ScalarType::U64 | ScalarType::I64 | ScalarType::F64 => 8,
        }
    }

    pub fn rust_type(&self) -> &'static str {
        match self {
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }
}

impl FieldType<'_> {
    /// Test if the type is encoded with a fixed width regardless of
    /// the field length attribute.
    pub fn is_scalar(&self) -> bool {
        matches!(self, FieldType::Scalar(_))
    }

    /// Test if the type is a byte sequence whose size is given by the
    /// field length attribute.
    pub fn is_sized(&self) -> bool {
        matches!(self, FieldType::String | FieldType::Bytes)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FieldType::Scalar(_) => "fixed-size",
            FieldType::String => "string",
            FieldType::Bytes => "byte-sequence",
            FieldType::Record(_) => "record",
            FieldType::Custom(_) => "custom",
        }
    }

    /// Rust type of the field value, before optional wrapping.
    pub fn rust_type(&self) -> String {
        match self {
            FieldType::Scalar(scalar) => scalar.rust_type().to_owned(),
            FieldType::String => "String".to_owned(),
            FieldType::Bytes | FieldType::Custom(_) => "Vec<u8>".to_owned(),
            FieldType::Record(id) => to_type_id(id),
        }
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc.
        self.name == other.name
            && self.type_ == other.type_
            && self.description == other.description
            && self.length == other.length
            && self.condition == other.condition
            && self.tags == other.tags
    }
}
impl Eq for Field {}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("type", &self.type_)
            .field("length", &self.length)
            .field("condition", &self.condition)
            .finish_non_exhaustive()
    }
}

impl Field {
    /// Rust identifier of the field.
    pub fn id(&self) -> String {
        to_field_id(&self.name)
    }

    pub fn length(&self) -> Length<'_> {
        let length = self.length.trim();
        if length.is_empty() {
            Length::None
        } else if length == MANUAL_LENGTH {
            Length::Manual
        } else if length == LEGACY_LENGTH {
            Length::Legacy
        } else if let Ok(n) = length.parse::<i64>() {
            Length::Fixed(n)
        } else {
            Length::Expression(length)
        }
    }

    /// Return the condition text, if the field is conditional.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref().map(str::trim)
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out loc.
        self.fields == other.fields
    }
}
impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record").field("fields", &self.fields).finish_non_exhaustive()
    }
}

impl Record {
    /// Return the `(field name, Rust type)` list of the record in
    /// wire order. Conditional fields are wrapped in `Option`, and
    /// conditional nested records are boxed.
    pub fn layout(&self, descriptor: &Descriptor) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|field| {
                let field_type = descriptor.field_type(field);
                let type_ = match (field.is_conditional(), &field_type) {
                    (true, FieldType::Record(_)) => format!("Option<Box<{}>>", field_type.rust_type()),
                    (true, _) => format!("Option<{}>", field_type.rust_type()),
                    (false, _) => field_type.rust_type(),
                };
                (field.name.clone(), type_)
            })
            .collect()
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        // Implement structural equality, leave out the file id.
        self.name == other.name
            && self.description == other.description
            && self.context_field_path == other.context_field_path
            && self.records == other.records
    }
}
impl Eq for Descriptor {}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl Descriptor {
    pub fn new(file: FileId) -> Descriptor {
        Descriptor { file, ..Default::default() }
    }

    /// Classify the type of the selected field.
    pub fn field_type<'d>(&'d self, field: &'d Field) -> FieldType<'d> {
        let type_ = field.type_.trim();
        if let Some(scalar) = ScalarType::from_name(type_) {
            return FieldType::Scalar(scalar);
        }
        match type_ {
            "string" => FieldType::String,
            "byte-sequence" | "bytes" | "[]byte" => FieldType::Bytes,
            _ => match self.records.get_key_value(type_) {
                Some((id, _)) => FieldType::Record(id),
                None => FieldType::Custom(type_),
            },
        }
    }

    /// Iterate over the records sorted by name.
    pub fn sorted_records(&self) -> Vec<(&String, &Record)> {
        let mut records = self.records.iter().collect::<Vec<_>>();
        records.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));
        records
    }
}
