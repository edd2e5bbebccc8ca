//! Procedural macros for the fezz gateway.
//!
//! This crate provides the `#[gateway_function]` attribute macro, which turns
//! a plain async function into a type implementing `GatewayFunction`.
//!
//! # Example
//!
//! ```ignore
//! use fezz_gateway::prelude::*;
//!
//! #[gateway_function(name = "hello", description = "Greets the caller")]
//! async fn hello(params: Params, ctx: &FunctionContext) -> Result<FunctionOutput, FunctionError> {
//!     Ok(FunctionOutput::new("Hello, World!"))
//! }
//!
//! let definition = HelloFunction::definition().param(ParameterSchema::string("name"));
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, punctuated::Punctuated, Expr, ExprLit, ItemFn, Lit, Meta, Token};

/// Attributes for the `#[gateway_function]` macro.
#[derive(Default, Debug)]
struct GatewayFunctionAttrs {
    /// Registered function name; defaults to the Rust function name.
    name: Option<String>,
    /// Optional description.
    description: Option<String>,
}

impl GatewayFunctionAttrs {
    fn parse_meta_list(metas: Punctuated<Meta, Token![,]>) -> syn::Result<Self> {
        let mut attrs = GatewayFunctionAttrs::default();

        for meta in metas {
            let Meta::NameValue(nv) = meta else {
                return Err(syn::Error::new_spanned(meta, "expected name = value"));
            };
            let ident = nv
                .path
                .get_ident()
                .ok_or_else(|| syn::Error::new_spanned(&nv.path, "expected identifier"))?
                .to_string();

            let value = match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(lit_str),
                    ..
                }) => lit_str.value(),
                _ => return Err(syn::Error::new_spanned(&nv.value, "expected string literal")),
            };

            match ident.as_str() {
                "name" => {
                    if value.is_empty() {
                        return Err(syn::Error::new_spanned(&nv.value, "name cannot be empty"));
                    }
                    attrs.name = Some(value);
                }
                "description" => attrs.description = Some(value),
                _ => {
                    return Err(syn::Error::new_spanned(
                        nv.path,
                        format!("unknown attribute: {}", ident),
                    ));
                }
            }
        }

        Ok(attrs)
    }
}

/// Expose an async function through the gateway.
///
/// The function must have the shape
/// `async fn(Params, &FunctionContext) -> Result<FunctionOutput, FunctionError>`.
/// A unit struct named after it in PascalCase with a `Function` suffix is
/// generated; `definition()` on that struct returns a `FunctionDefinition`
/// ready for parameters to be declared and for registration.
///
/// # Attributes
///
/// - `name` (optional): registered function name (default: the Rust name)
/// - `description` (optional): function description
#[proc_macro_attribute]
pub fn gateway_function(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    match generate_gateway_function(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_gateway_function(
    args: Punctuated<Meta, Token![,]>,
    input_fn: ItemFn,
) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = GatewayFunctionAttrs::parse_meta_list(args)?;

    if input_fn.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &input_fn.sig,
            "gateway_function must be async",
        ));
    }
    if input_fn.sig.inputs.len() != 2 {
        return Err(syn::Error::new_spanned(
            &input_fn.sig.inputs,
            "gateway_function takes (Params, &FunctionContext)",
        ));
    }

    let fn_name = &input_fn.sig.ident;
    let fn_vis = &input_fn.vis;
    let struct_name = format_ident!("{}Function", to_pascal_case(&fn_name.to_string()));
    let function_name = attrs.name.unwrap_or_else(|| fn_name.to_string());
    let description = attrs.description.unwrap_or_default();

    let expanded = quote! {
        #input_fn

        /// Generated gateway function type.
        #[derive(Debug, Default, Clone, Copy)]
        #fn_vis struct #struct_name;

        impl #struct_name {
            /// Registered function name.
            pub const NAME: &'static str = #function_name;
            /// Function description.
            pub const DESCRIPTION: &'static str = #description;

            /// Create a new instance of the function.
            pub fn new() -> Self {
                Self
            }

            /// A definition with no declared parameters yet.
            pub fn definition() -> fezz_gateway::function::FunctionDefinition {
                fezz_gateway::function::FunctionDefinition::new(Self::NAME, Self)
                    .with_description(Self::DESCRIPTION)
            }
        }

        #[fezz_gateway::prelude::async_trait]
        impl fezz_gateway::prelude::GatewayFunction for #struct_name {
            async fn call(
                &self,
                params: fezz_gateway::prelude::Params,
                ctx: &fezz_gateway::prelude::FunctionContext,
            ) -> Result<fezz_gateway::prelude::FunctionOutput, fezz_gateway::prelude::FunctionError> {
                #fn_name(params, ctx).await
            }
        }
    };

    Ok(expanded)
}

/// Convert a snake_case string to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}
