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
use crate::backends::rust::{types, FieldContext, FieldLength, SynthesisError};
use quote::quote;

/// Represents the computed size of an encoded record, in bytes.
#[derive(Default)]
struct RuntimeSize {
    constant: usize,
    variable: Vec<proc_macro2::TokenStream>,
}

impl quote::ToTokens for RuntimeSize {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        let constant = proc_macro2::Literal::usize_unsuffixed(self.constant);
        tokens.extend(match self {
            RuntimeSize { variable, .. } if variable.is_empty() => quote! { #constant },
            RuntimeSize { variable, constant: 0 } => quote! { #(#variable)+* },
            RuntimeSize { variable, .. } => quote! { #constant + #(#variable)+* },
        })
    }
}

/// Generate the body of `Record::encode_with` and the expression
/// of `Record::encoded_len`.
pub(crate) struct FieldEncoder {
    buf: proc_macro2::Ident,
    size: RuntimeSize,
    pub tokens: proc_macro2::TokenStream,
}

impl FieldEncoder {
    pub fn new(buf: proc_macro2::Ident) -> FieldEncoder {
        FieldEncoder { buf, size: RuntimeSize::default(), tokens: quote! {} }
    }

    /// Return the encoded size of the record fields added so far.
    pub fn size(&self) -> proc_macro2::TokenStream {
        quote::ToTokens::to_token_stream(&self.size)
    }

    fn add_size(&mut self, field: &FieldContext<'_>) {
        let id = &field.id;
        match (&field.field_type, &field.condition) {
            (ast::FieldType::Scalar(scalar), None) => self.size.constant += scalar.width(),
            (ast::FieldType::Scalar(scalar), Some(_)) => {
                let width = proc_macro2::Literal::usize_unsuffixed(scalar.width());
                self.size.variable.push(quote! { self.#id.as_ref().map_or(0, |_| #width) })
            }
            (ast::FieldType::Record(_), None) => {
                self.size.variable.push(quote! { self.#id.encoded_len() })
            }
            (ast::FieldType::Record(_), Some(_)) => self
                .size
                .variable
                .push(quote! { self.#id.as_ref().map_or(0, |value| value.encoded_len()) }),
            (_, None) => self.size.variable.push(quote! { self.#id.len() }),
            (_, Some(_)) => {
                self.size.variable.push(quote! { self.#id.as_ref().map_or(0, |value| value.len()) })
            }
        }
    }

    /// Generate the encoding of a byte sequence.
    /// `value` is a place or reference holding the field value.
    fn encode_sized(
        &self,
        field: &FieldContext<'_>,
        value: &proc_macro2::TokenStream,
    ) -> proc_macro2::TokenStream {
        let buf = &self.buf;
        let record = field.record;
        let field_name = &field.field.name;
        let bytes = match field.field_type {
            ast::FieldType::String => quote! { #value.as_bytes() },
            _ => quote! { #value.as_slice() },
        };
        let check_length = match &field.length {
            FieldLength::Fixed(length) => {
                let length = proc_macro2::Literal::usize_unsuffixed(*length);
                quote! {
                    if #value.len() != #length {
                        return Err(EncodeError::InvalidFixedLength {
                            record: #record,
                            field: #field_name,
                            expected: #length,
                            actual: #value.len(),
                        });
                    }
                }
            }
            FieldLength::Expression { id, context } => {
                let check = quote! {
                    let expected = #id.length(self, context).map_err(|source| {
                        EncodeError::InvalidLength { record: #record, field: #field_name, source }
                    })?;
                    if expected != #value.len() {
                        return Err(EncodeError::LengthMismatch {
                            record: #record,
                            field: #field_name,
                            expected,
                            actual: #value.len(),
                        });
                    }
                };
                // Lengths read from the context record cannot be
                // verified when no context is provided.
                if *context {
                    quote! {
                        if context.is_some() {
                            #check
                        }
                    }
                } else {
                    check
                }
            }
            FieldLength::Unsized | FieldLength::Manual => quote! {},
        };
        quote! {
            #check_length
            #buf.put_slice(#bytes);
        }
    }

    pub fn add(&mut self, field: &FieldContext<'_>) -> Result<(), SynthesisError> {
        self.add_size(field);

        let buf = &self.buf;
        let id = &field.id;
        let record = field.record;
        let field_name = &field.field.name;

        // Conditional fields are encoded from a reference to the
        // present value, bound to a local that no field name can hide.
        let value = match field.condition {
            Some(_) => quote! { value },
            None => quote! { self.#id },
        };
        let encode = match &field.field_type {
            _ if field.is_manual() => quote! {
                return Err(EncodeError::NotImplemented { record: #record, field: #field_name });
            },
            ast::FieldType::Scalar(scalar) => {
                let put = types::put_scalar(*scalar);
                match field.condition {
                    Some(_) => quote! { #buf.#put(*#value); },
                    None => quote! { #buf.#put(#value); },
                }
            }
            ast::FieldType::Record(_) => quote! { #value.encode_with(#buf, context)?; },
            ast::FieldType::String | ast::FieldType::Bytes | ast::FieldType::Custom(_) => {
                self.encode_sized(field, &value)
            }
        };

        self.tokens.extend(match &field.condition {
            Some(condition) => {
                let condition_id = &condition.id;
                let evaluate = quote! {
                    #condition_id.condition(self, context).map_err(|source| {
                        EncodeError::InvalidCondition { record: #record, field: #field_name, source }
                    })?
                };
                // Without a context record, conditions reading from the
                // context are decided by the presence of the value.
                let present = if condition.context {
                    quote! {
                        if context.is_some() {
                            #evaluate
                        } else {
                            self.#id.is_some()
                        }
                    }
                } else {
                    evaluate
                };
                let unwrap = (!field.is_manual()).then(|| {
                    quote! {
                        let value = self.#id.as_ref().ok_or(EncodeError::MissingConditionalField {
                            record: #record,
                            field: #field_name,
                        })?;
                    }
                });
                quote! {
                    let present = #present;
                    if present {
                        #unwrap
                        #encode
                    }
                }
            }
            None => encode,
        });
        Ok(())
    }
}
