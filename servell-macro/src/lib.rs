//! Procedural macros for servell.
//!
//! This crate provides the `#[rpc_method]` attribute macro, which turns an
//! async fn into a method descriptor carrying its own name and metadata.
//!
//! # Example
//!
//! ```ignore
//! use servell::prelude::*;
//!
//! #[rpc_method(name = "deposit", verb = "POST", body = "json", cache = "no-store")]
//! async fn deposit(invocation: Invocation) -> Result<Value, Failure> {
//!     Ok(json!({ "ok": true }))
//! }
//!
//! let class = ClassDef::new("Accounts").declare::<DepositMethod>();
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, punctuated::Punctuated, Expr, ExprLit, ItemFn, Lit, Meta, Token};

/// Attributes for the `#[rpc_method]` macro.
#[derive(Default, Debug)]
struct RpcMethodAttrs {
    /// Wire name of the method.
    name: Option<String>,
    /// HTTP verb.
    verb: Option<String>,
    /// Content mode of successful results.
    content: Option<String>,
    /// Argument placement, `json` or `omit`.
    body: Option<String>,
    /// Cache directive.
    cache: Option<String>,
    /// Extra request headers, each written `"Name: value"`.
    headers: Vec<(String, String)>,
}

impl RpcMethodAttrs {
    fn parse_meta_list(metas: Punctuated<Meta, Token![,]>) -> syn::Result<Self> {
        let mut attrs = RpcMethodAttrs::default();

        for meta in metas {
            let nv = match meta {
                Meta::NameValue(nv) => nv,
                other => return Err(syn::Error::new_spanned(other, "expected name = value")),
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
                "name" => attrs.name = Some(value),
                "verb" => attrs.verb = Some(value),
                "content" => attrs.content = Some(value),
                "body" => attrs.body = Some(value),
                "cache" => attrs.cache = Some(value),
                "header" => {
                    let (key, val) = value.split_once(':').ok_or_else(|| {
                        syn::Error::new_spanned(&nv.value, "expected \"Name: value\"")
                    })?;
                    attrs.headers.push((key.trim().to_string(), val.trim().to_string()));
                }
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

/// The `#[rpc_method]` attribute macro.
///
/// The annotated function must be `async fn(Invocation) -> Result<Value, Failure>`.
/// It is kept as written; next to it the macro generates a unit struct named
/// `<PascalCaseFnName>Method` implementing `AsyncMethod` and `DeclaredMethod`.
///
/// # Attributes
///
/// - `name` (optional): wire name (default: the fn name)
/// - `verb` (optional): `GET`, `POST`, `PUT`, `PATCH` or `DELETE` (default: `GET`)
/// - `content` (optional): `json`, `text`, or any other mode (default: `json`)
/// - `body` (optional): `json` or `omit` (default: `omit`)
/// - `cache` (optional): `default`, `no-store`, `reload`, `no-cache`,
///   `force-cache` or `only-if-cached`
/// - `header` (repeatable): `"Name: value"`
#[proc_macro_attribute]
pub fn rpc_method(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_fn = parse_macro_input!(input as ItemFn);

    match generate_rpc_method(args, input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_rpc_method(
    args: Punctuated<Meta, Token![,]>,
    input_fn: ItemFn,
) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = RpcMethodAttrs::parse_meta_list(args)?;

    if input_fn.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            &input_fn.sig,
            "rpc_method must be async",
        ));
    }

    let fn_name = &input_fn.sig.ident;
    let fn_vis = &input_fn.vis;
    let struct_name = format_ident!("{}Method", to_pascal_case(&fn_name.to_string()));
    let wire_name = attrs.name.unwrap_or_else(|| fn_name.to_string());

    let verb = match attrs.verb.as_deref().map(str::to_ascii_uppercase).as_deref() {
        None | Some("GET") => quote!(servell::http::Verb::Get),
        Some("POST") => quote!(servell::http::Verb::Post),
        Some("PUT") => quote!(servell::http::Verb::Put),
        Some("PATCH") => quote!(servell::http::Verb::Patch),
        Some("DELETE") => quote!(servell::http::Verb::Delete),
        Some(other) => {
            return Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                format!("unsupported verb: {}", other),
            ))
        }
    };

    let content = attrs.content.unwrap_or_else(|| "json".to_string());

    let body = match attrs.body.as_deref() {
        None | Some("omit") => quote!(servell::rpc::BodyMode::Omit),
        Some("json") => quote!(servell::rpc::BodyMode::Json),
        Some(other) => {
            return Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                format!("unsupported body mode: {}", other),
            ))
        }
    };

    let cache = match attrs.cache.as_deref() {
        None => quote!(),
        Some(policy) => {
            let variant = match policy {
                "default" => quote!(Default),
                "no-store" => quote!(NoStore),
                "reload" => quote!(Reload),
                "no-cache" => quote!(NoCache),
                "force-cache" => quote!(ForceCache),
                "only-if-cached" => quote!(OnlyIfCached),
                other => {
                    return Err(syn::Error::new(
                        proc_macro2::Span::call_site(),
                        format!("unknown cache policy: {}", other),
                    ))
                }
            };
            quote!(.cache(servell::rpc::CachePolicy::#variant))
        }
    };

    let headers = attrs
        .headers
        .iter()
        .map(|(key, value)| quote!(.header(#key, #value)));

    let expanded = quote! {
        /// Generated method descriptor.
        #[derive(Default, Debug, Clone, Copy)]
        #fn_vis struct #struct_name;

        impl #struct_name {
            /// Create a new instance of the method.
            pub fn new() -> Self {
                Self
            }
        }

        #[servell::prelude::async_trait]
        impl servell::rpc::AsyncMethod for #struct_name {
            async fn call(
                &self,
                invocation: servell::rpc::Invocation,
            ) -> Result<servell::Value, servell::rpc::Failure> {
                #fn_name(invocation).await
            }
        }

        impl servell::rpc::DeclaredMethod for #struct_name {
            const NAME: &'static str = #wire_name;

            fn meta() -> servell::rpc::MethodMeta {
                servell::rpc::MethodMeta::new()
                    .verb(#verb)
                    .content(#content)
                    .body(#body)
                    #cache
                    #(#headers)*
            }
        }

        #input_fn
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
