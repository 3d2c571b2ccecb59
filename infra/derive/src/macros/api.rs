use fxhash::FxHashSet;
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, ItemFn, ItemStruct, Lit, LitStr, MetaNameValue, Token};

const DEFAULT_RENAME: &str = "snake_case";

/// Expands `#[api_model]`.
///
/// Adds the missing serde derives, the `ToSchema` derive behind the `server` feature and a
/// `rename_all` policy unless the struct already declares one.
pub fn expand_api_model(args: TokenStream, input: ItemStruct) -> TokenStream {
    let rename_all = match parse_rename_all(args) {
        Ok(value) => value,
        Err(err) => return err.into_compile_error(),
    };

    let derives = derive_names(&input.attrs);
    let mut missing = Vec::new();
    if !derives.contains("Debug") {
        missing.push(quote! { Debug });
    }
    if !derives.contains("Serialize") {
        missing.push(quote! { ::serde::Serialize });
    }
    if !derives.contains("Deserialize") {
        missing.push(quote! { ::serde::Deserialize });
    }
    let derive_attr = if missing.is_empty() {
        TokenStream::new()
    } else {
        quote! { #[derive(#(#missing),*)] }
    };

    let schema_attr = if derives.contains("ToSchema") {
        TokenStream::new()
    } else {
        quote! { #[cfg_attr(feature = "server", derive(::utoipa::ToSchema))] }
    };

    let rename_attr = if declares_rename_all(&input.attrs) {
        TokenStream::new()
    } else {
        let policy = rename_all.unwrap_or_else(|| LitStr::new(DEFAULT_RENAME, Span::call_site()));
        quote! { #[serde(rename_all = #policy)] }
    };

    quote! {
        #derive_attr
        #schema_attr
        #rename_attr
        #input
    }
}

/// Expands `#[api_handler]`.
pub fn expand_api_handler(args: TokenStream, input: ItemFn) -> TokenStream {
    let ItemFn { attrs, vis, sig, block } = input;

    quote! {
        #(#attrs)*
        #[allow(clippy::unused_async)]
        #[cfg_attr(feature = "server", ::utoipa::path(#args))]
        #vis #sig #block
    }
}

fn parse_rename_all(args: TokenStream) -> syn::Result<Option<LitStr>> {
    let metas = Punctuated::<MetaNameValue, Token![,]>::parse_terminated.parse2(args)?;

    let mut rename_all = None;
    for meta in metas {
        if !meta.path.is_ident("rename_all") {
            return Err(syn::Error::new_spanned(meta.path, "expected `rename_all = \"...\"`"));
        }
        if rename_all.is_some() {
            return Err(syn::Error::new_spanned(meta.path, "duplicate `rename_all`"));
        }
        let Expr::Lit(expr) = &meta.value else {
            return Err(syn::Error::new_spanned(meta.value, "rename_all must be a string literal"));
        };
        let Lit::Str(lit) = &expr.lit else {
            return Err(syn::Error::new_spanned(&expr.lit, "rename_all must be a string literal"));
        };
        rename_all = Some(lit.clone());
    }

    Ok(rename_all)
}

fn declares_rename_all(attrs: &[Attribute]) -> bool {
    let mut found = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                found = true;
            }
            if meta.input.peek(Token![=]) {
                let _: Expr = meta.value()?.parse()?;
            }
            Ok(())
        });
    }
    found
}

fn derive_names(attrs: &[Attribute]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                names.insert(last.ident.to_string());
            }
            Ok(())
        });
    }
    names
}
