//! Credential checks that run before any request reaches the storage layer.

mod credential;

pub use credential::{ApiKeyGate, SecurityError, SecurityErrorExt};
