#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the FileGate crates: error enums, API models and
//! handlers, and the runtime bootstrap used by the server binary.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, ItemStruct, parse_macro_input};

/// Bootstraps `async fn main` on a pre-configured Tokio runtime.
///
/// The argument selects a [`RuntimeConfig`] preset from `fgate-runtime`:
/// `default`, `high_performance`, `memory_efficient` or `io_bound`.
///
/// ```rust,ignore
/// #[fgate_runtime::main(io_bound)]
/// async fn main() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
///
/// [`RuntimeConfig`]: https://docs.rs/fgate-runtime
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Declares a wire DTO.
///
/// Adds `Debug`, `Serialize`, `Deserialize` when missing, `utoipa::ToSchema` behind the
/// `server` feature, and a serde `rename_all` policy (`snake_case` unless overridden with
/// `#[api_model(rename_all = "...")]`).
///
/// ```rust,ignore
/// #[api_model]
/// pub struct RenameResponse {
///     pub from: String,
///     pub to: String,
/// }
/// ```
#[proc_macro_attribute]
pub fn api_model(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    macros::api::expand_api_model(attr.into(), input).into()
}

/// Registers an Axum handler with `utoipa::path` when the `server` feature is enabled.
///
/// Accepts the usual `utoipa::path` arguments (`get`, `path = "..."`, `params(...)`,
/// `responses(...)`, `tag = ...`).
#[proc_macro_attribute]
pub fn api_handler(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::api::expand_api_handler(args.into(), input).into()
}

/// Turns an enum with named-field variants into a workspace error type.
///
/// Generates:
/// * `#[derive(Debug, thiserror::Error)]` unless already present;
/// * a `<Name>Ext` trait with `.context(...)` for `Result<T, Name>` and for
///   `Result<T, Source>` of every variant holding a `source` field;
/// * `From<Source>` for those variants;
/// * `From<&'static str>` / `From<String>` when an `Internal` variant exists;
/// * `Name::kind(&self) -> &'static str`, the variant name in `snake_case`, for logs and
///   wire payloads.
///
/// Every variant with a source must also carry `context: Option<Cow<'static, str>>`.
///
/// ```rust,ignore
/// #[fgate_derive::fgate_error]
/// pub enum StorageError {
///     #[error("Not found{}: {message}", format_context(.context))]
///     NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
///
///     #[error("I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
/// }
///
/// assert_eq!(StorageError::from(io_err).kind(), "io");
/// ```
#[proc_macro_attribute]
pub fn fgate_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
