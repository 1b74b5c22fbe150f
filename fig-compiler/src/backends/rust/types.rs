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

//! Utility functions for dealing with Rust field types.

use crate::ast;
use crate::backends::rust::{record_ident, FieldContext, SynthesisError};
use quote::{format_ident, quote};

/// Return the method reading a scalar from a `Buf`.
pub fn get_scalar(scalar: ast::ScalarType) -> proc_macro2::Ident {
    match scalar {
        ast::ScalarType::U8 | ast::ScalarType::I8 => format_ident!("get_{}", scalar.rust_type()),
        _ => format_ident!("get_{}_le", scalar.rust_type()),
    }
}

/// Return the method writing a scalar to a `BufMut`.
pub fn put_scalar(scalar: ast::ScalarType) -> proc_macro2::Ident {
    match scalar {
        ast::ScalarType::U8 | ast::ScalarType::I8 => format_ident!("put_{}", scalar.rust_type()),
        _ => format_ident!("put_{}_le", scalar.rust_type()),
    }
}

/// Return the Rust type of the field value, without the optional
/// wrapping of conditional fields.
pub fn value_type(field: &FieldContext<'_>) -> Result<proc_macro2::TokenStream, SynthesisError> {
    Ok(match &field.field_type {
        ast::FieldType::Scalar(scalar) => {
            let type_ = format_ident!("{}", scalar.rust_type());
            quote!(#type_)
        }
        ast::FieldType::String => quote!(String),
        ast::FieldType::Bytes | ast::FieldType::Custom(_) => quote!(Vec<u8>),
        ast::FieldType::Record(id) => {
            let type_ = record_ident(id)?;
            quote!(#type_)
        }
    })
}

/// Return the declared Rust type of the field.
/// Conditional nested records are boxed to allow records to
/// reference themselves.
pub fn rust_type(field: &FieldContext<'_>) -> Result<proc_macro2::TokenStream, SynthesisError> {
    let type_ = value_type(field)?;
    Ok(match (&field.field_type, &field.condition) {
        (ast::FieldType::Record(_), Some(_)) => quote!(Option<Box<#type_>>),
        (_, Some(_)) => quote!(Option<#type_>),
        (_, None) => type_,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_accessors() {
        assert_eq!(get_scalar(ast::ScalarType::U8).to_string(), "get_u8");
        assert_eq!(get_scalar(ast::ScalarType::I64).to_string(), "get_i64_le");
        assert_eq!(put_scalar(ast::ScalarType::F32).to_string(), "put_f32_le");
        assert_eq!(put_scalar(ast::ScalarType::I8).to_string(), "put_i8");
    }
}
