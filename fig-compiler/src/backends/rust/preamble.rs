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
use crate::backends::rust::{record_ident, Requirements};
use quote::quote;

/// Return the comment heading every generated file.
pub fn header(descriptor: &ast::Descriptor) -> String {
    let mut header = format!("// @generated by figc from the `{}` format descriptor.\n", descriptor.name);
    for line in descriptor.description.lines() {
        header.push_str(format!("// {line}").trim_end());
        header.push('\n');
    }
    header.push('\n');
    header
}

/// Generate the imports of the generated code.
/// Only the items used by the generated code are imported, to keep
/// it free of warnings.
pub fn generate(requirements: &Requirements) -> proc_macro2::TokenStream {
    let bytes = if requirements.reads {
        quote! { use fig_runtime::bytes::{Buf, BufMut}; }
    } else {
        quote! { use fig_runtime::bytes::BufMut; }
    };
    let expression = requirements.expressions.then(|| quote! { Expression, });
    // Records nested in a record of another module are imported from
    // the parent module.
    let nested = requirements
        .nested
        .iter()
        .filter_map(|type_id| record_ident(type_id).ok())
        .map(|type_| quote! { use super::#type_; });
    quote! {
        #bytes
        use fig_runtime::{DecodeError, EncodeError, #expression Record, Scope, Value};
        #(#nested)*
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::{assert_that, contains_substring, not};
    use std::collections::BTreeSet;

    #[test]
    fn test_generate_preamble() {
        let requirements = Requirements {
            reads: true,
            expressions: true,
            nested: BTreeSet::from(["Inner".to_owned()]),
        };
        let code = crate::backends::rust::format_rust(generate(&requirements));
        assert_that!(code, contains_substring("use fig_runtime::bytes::{Buf, BufMut};"));
        assert_that!(
            code,
            contains_substring("use fig_runtime::{DecodeError, EncodeError, Expression, Record, Scope, Value};")
        );
        assert_that!(code, contains_substring("use super::Inner;"));
    }

    #[test]
    fn test_generate_preamble_minimal() {
        let code = crate::backends::rust::format_rust(generate(&Requirements::default()));
        assert_that!(code, contains_substring("use fig_runtime::bytes::BufMut;"));
        assert_that!(code, not(contains_substring("Expression")));
        assert_that!(code, not(contains_substring("super")));
    }

    #[test]
    fn test_header() {
        let mut descriptor = ast::Descriptor::new(0);
        descriptor.name = "bmp".to_owned();
        descriptor.description = "Bitmap images.".to_owned();
        assert_eq!(
            header(&descriptor),
            "// @generated by figc from the `bmp` format descriptor.\n// Bitmap images.\n\n"
        );
    }
}
