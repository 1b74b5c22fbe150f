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

use crate::ast;
use crate::backends::rust::{record_ident, types, FieldContext, FieldLength, SynthesisError};
use quote::quote;

/// Generate the body of `Record::decode_with`.
///
/// Fields are decoded in wire order into the local `record`, which
/// is the `self` scope of the expressions of the following fields.
pub(crate) struct FieldDecoder {
    buf: proc_macro2::Ident,
    pub tokens: proc_macro2::TokenStream,
}

impl FieldDecoder {
    pub fn new(buf: proc_macro2::Ident) -> FieldDecoder {
        FieldDecoder { buf, tokens: quote! {} }
    }

    /// Generate a check that `wanted` bytes remain in the input.
    fn check_size(&self, field: &FieldContext<'_>, wanted: &proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        let buf = &self.buf;
        let record = field.record;
        let field_name = &field.field.name;
        quote! {
            if #buf.remaining() < #wanted {
                return Err(DecodeError::InvalidLengthError {
                    record: #record,
                    field: #field_name,
                    wanted: #wanted,
                    got: #buf.remaining(),
                });
            }
        }
    }

    /// Generate the assignment of the decoded value.
    fn assign(field: &FieldContext<'_>, value: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        let id = &field.id;
        match (&field.field_type, &field.condition) {
            (ast::FieldType::Record(_), Some(_)) => quote! { record.#id = Some(Box::new(#value)); },
            (_, Some(_)) => quote! { record.#id = Some(#value); },
            (_, None) => quote! { record.#id = #value; },
        }
    }

    /// Generate the decoding of a byte sequence of `length` bytes.
    fn decode_sized(&self, field: &FieldContext<'_>, length: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        let buf = &self.buf;
        let record = field.record;
        let field_name = &field.field.name;
        let check_size = self.check_size(field, &length);
        let value = match field.field_type {
            ast::FieldType::String => quote! {
                String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 {
                    record: #record,
                    field: #field_name,
                })?
            },
            _ => quote! { bytes.to_vec() },
        };
        let assign = Self::assign(field, value);
        quote! {
            #check_size
            let (bytes, remaining) = #buf.split_at(#length);
            #assign
            #buf = remaining;
        }
    }

    pub fn add(&mut self, field: &FieldContext<'_>) -> Result<(), SynthesisError> {
        let buf = &self.buf;
        let record = field.record;
        let field_name = &field.field.name;

        let decode = match (&field.field_type, &field.length) {
            _ if field.is_manual() => quote! {
                return Err(DecodeError::NotImplemented { record: #record, field: #field_name });
            },
            (ast::FieldType::Scalar(scalar), _) => {
                let width = proc_macro2::Literal::usize_unsuffixed(scalar.width());
                let check_size = self.check_size(field, &quote!(#width));
                let get = types::get_scalar(*scalar);
                let assign = Self::assign(field, quote! { #buf.#get() });
                quote! {
                    #check_size
                    #assign
                }
            }
            (ast::FieldType::Record(type_id), _) => {
                let type_ = record_ident(type_id)?;
                Self::assign(field, quote! { #type_::decode_mut(&mut #buf, context)? })
            }
            (_, FieldLength::Fixed(length)) => {
                let length = proc_macro2::Literal::usize_unsuffixed(*length);
                self.decode_sized(field, quote!(#length))
            }
            (_, FieldLength::Expression { id, .. }) => {
                let decode = self.decode_sized(field, quote!(length));
                quote! {
                    let length = #id.length(&record, context).map_err(|source| {
                        DecodeError::InvalidLength { record: #record, field: #field_name, source }
                    })?;
                    #decode
                }
            }
            (_, FieldLength::Unsized | FieldLength::Manual) => {
                unreachable!("byte sequence field without length")
            }
        };

        self.tokens.extend(match &field.condition {
            Some(condition) => {
                let id = &condition.id;
                quote! {
                    if #id.condition(&record, context).map_err(|source| {
                        DecodeError::InvalidCondition { record: #record, field: #field_name, source }
                    })? {
                        #decode
                    }
                }
            }
            None => decode,
        });
        Ok(())
    }
}
