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

use codespan_reporting::term;
use fig_compiler::{analyzer, ast, backends, parser};
use proc_macro2::TokenStream;
use quote::quote;
use std::env;
use std::path::Path;
use syn::parse_macro_input;

/// Render a loader diagnostic as a compile error.
fn parser_error(
    span: proc_macro2::Span,
    sources: &ast::SourceDatabase,
    err: &codespan_reporting::diagnostic::Diagnostic<ast::FileId>,
) -> TokenStream {
    let mut buffer = termcolor::Buffer::no_color();
    let message = match term::emit(&mut buffer, &term::Config::default(), sources, err) {
        Ok(()) => String::from_utf8_lossy(buffer.as_slice()).into_owned(),
        Err(_) => format!("error: {}", err.message),
    };
    syn::Error::new(span, message).to_compile_error()
}

/// Validate the descriptor and expand it into the input module.
fn expand(
    span: proc_macro2::Span,
    sources: &ast::SourceDatabase,
    descriptor: &ast::Descriptor,
    input: syn::ItemMod,
    dependency: TokenStream,
) -> TokenStream {
    let descriptor = match analyzer::analyze(descriptor) {
        Ok(descriptor) => descriptor,
        Err(diagnostics) => {
            let mut buffer = termcolor::Buffer::no_color();
            let message = match diagnostics.emit(sources, &mut buffer) {
                Ok(()) => String::from_utf8_lossy(buffer.as_slice()).into_owned(),
                Err(_) => String::from("error: descriptor validation failed"),
            };
            return syn::Error::new(span, message).to_compile_error();
        }
    };

    let codecs = match backends::rust::generate_tokens(&descriptor) {
        Ok(codecs) => codecs,
        Err(err) => return syn::Error::new(span, format!("error: {err}")).to_compile_error(),
    };
    let mod_ident = input.ident;
    let mod_attrs = input.attrs;
    let mod_vis = input.vis;
    let mod_items = input.content.map(|(_, items)| items).unwrap_or_default();

    quote! {
        #(#mod_attrs)*
        #mod_vis mod #mod_ident {
            #dependency
            #codecs
            #(#mod_items)*
        }
    }
}

fn fig_proc_macro(path: syn::LitStr, input: syn::ItemMod) -> TokenStream {
    // Locate the descriptor file.
    let root = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into());
    let Some(relative_path) =
        [Path::new(&root).join(path.value()), Path::new(&root).join("src").join(path.value())]
            .into_iter()
            .find(|path| path.exists())
    else {
        return syn::Error::new(path.span(), "error: unable to find file").to_compile_error();
    };
    let relative_path = relative_path.to_string_lossy().into_owned();

    let mut sources = ast::SourceDatabase::new();
    let descriptor = match parser::parse_file(&mut sources, &relative_path) {
        Ok(descriptor) => descriptor,
        Err(err) => return parser_error(path.span(), &sources, &err),
    };

    // Force a rebuild when the descriptor file changes.
    let dependency = quote! { const _: &[u8] = include_bytes!(#relative_path); };
    expand(path.span(), &sources, &descriptor, input, dependency)
}

fn fig_inline_proc_macro(source: syn::LitStr, input: syn::ItemMod) -> TokenStream {
    let mut sources = ast::SourceDatabase::new();
    let descriptor = match parser::parse_inline(&mut sources, "<inline>", source.value()) {
        Ok(descriptor) => descriptor,
        Err(err) => return parser_error(source.span(), &sources, &err),
    };
    expand(source.span(), &sources, &descriptor, input, quote! {})
}

/// Expand the format descriptor found at the given path, relative to
/// the crate root or its `src` directory, into the annotated module.
#[proc_macro_attribute]
pub fn fig(attr: proc_macro::TokenStream, input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let attr = parse_macro_input!(attr as syn::LitStr);
    let input = parse_macro_input!(input as syn::ItemMod);
    fig_proc_macro(attr, input).into()
}

/// Expand an inline format descriptor into the annotated module.
#[proc_macro_attribute]
pub fn fig_inline(
    attr: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let attr = parse_macro_input!(attr as syn::LitStr);
    let input = parse_macro_input!(input as syn::ItemMod);
    fig_inline_proc_macro(attr, input).into()
}
