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

//! Helper definitions used by the generated record codecs.

pub mod expr;
pub mod functions;
mod value;

pub use bytes;
use bytes::{BufMut, Bytes, BytesMut};
pub use expr::{Expr, ExprError, Expression};
pub use value::{Scope, Value};

/// Type of decoding errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error("when decoding {record}.{field} needed length of {wanted} but got {got}")]
    InvalidLengthError { record: &'static str, field: &'static str, wanted: usize, got: usize },
    #[error("{record}.{field} is not valid UTF-8")]
    InvalidUtf8 { record: &'static str, field: &'static str },
    #[error("cannot evaluate the length of {record}.{field}")]
    InvalidLength {
        record: &'static str,
        field: &'static str,
        #[source]
        source: ExprError,
    },
    #[error("cannot evaluate the condition of {record}.{field}")]
    InvalidCondition {
        record: &'static str,
        field: &'static str,
        #[source]
        source: ExprError,
    },
    #[error("{record}.{field} requires manual completion of its decoding logic")]
    NotImplemented { record: &'static str, field: &'static str },
    #[error("{record} has {remaining} trailing byte(s)")]
    TrailingBytes { record: &'static str, remaining: usize },
}

/// Type of encoding errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EncodeError {
    #[error("{record}.{field} holds {actual} byte(s), but exactly {expected} are required")]
    InvalidFixedLength { record: &'static str, field: &'static str, expected: usize, actual: usize },
    #[error("{record}.{field} holds {actual} byte(s), but its length expression evaluates to {expected}")]
    LengthMismatch { record: &'static str, field: &'static str, expected: usize, actual: usize },
    #[error("cannot evaluate the length of {record}.{field}")]
    InvalidLength {
        record: &'static str,
        field: &'static str,
        #[source]
        source: ExprError,
    },
    #[error("cannot evaluate the condition of {record}.{field}")]
    InvalidCondition {
        record: &'static str,
        field: &'static str,
        #[source]
        source: ExprError,
    },
    #[error("{record}.{field} is required by its condition but has no value")]
    MissingConditionalField { record: &'static str, field: &'static str },
    #[error("{record}.{field} requires manual completion of its encoding logic")]
    NotImplemented { record: &'static str, field: &'static str },
}

/// Trait implemented for all generated record declarations.
///
/// `context` is the optional record, decoded earlier, that
/// `context.<field>` paths resolve against.
pub trait Record: Scope + Default + Sized {
    /// Name of the record in the format descriptor.
    const NAME: &'static str;

    /// Try decoding an instance of Self from the input slice.
    /// On success, returns the decoded record and the remaining slice.
    fn decode_with<'a>(
        buf: &'a [u8],
        context: Option<&dyn Scope>,
    ) -> Result<(Self, &'a [u8]), DecodeError>;

    /// Try decoding an instance of Self without context.
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        Self::decode_with(buf, None)
    }

    /// Try decoding an instance of Self updating the slice in place
    /// to the remainder of the data. The input buffer is not updated if
    /// decoding fails.
    fn decode_mut(buf: &mut &[u8], context: Option<&dyn Scope>) -> Result<Self, DecodeError> {
        let (record, remaining) = Self::decode_with(*buf, context)?;
        *buf = remaining;
        Ok(record)
    }

    /// Try decoding an instance of Self from the input slice.
    /// Returns an error if undecoded bytes remain at the end of the input slice.
    fn decode_full(buf: &[u8], context: Option<&dyn Scope>) -> Result<Self, DecodeError> {
        let (record, remaining) = Self::decode_with(buf, context)?;
        if remaining.is_empty() {
            Ok(record)
        } else {
            Err(DecodeError::TrailingBytes { record: Self::NAME, remaining: remaining.len() })
        }
    }

    /// Return the length of the encoded record.
    fn encoded_len(&self) -> usize;

    /// Write the record to an output buffer.
    fn encode_with(
        &self,
        buf: &mut impl BufMut,
        context: Option<&dyn Scope>,
    ) -> Result<(), EncodeError>;

    /// Write the record to an output buffer without context.
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        self.encode_with(buf, None)
    }

    /// Encode the record to a byte vector.
    fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Encode the record to a Bytes object.
    fn encode_to_bytes(&self) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}
