//! File API feature slice.
//!
//! Wire models are always available; the Axum handlers, the error mapping and the
//! [`router`] live behind the `server` feature.

mod models;

#[cfg(feature = "server")]
mod error;
#[cfg(feature = "server")]
mod handlers;
#[cfg(feature = "server")]
mod response;

pub use models::*;

#[cfg(feature = "server")]
pub use error::{FilesError, FilesErrorExt};
#[cfg(feature = "server")]
pub use handlers::router;
