//! Axum building blocks shared by every slice.

pub mod auth;
pub mod health;
pub mod router;
pub mod state;

pub use auth::require_api_key;
pub use router::system_router;
pub use state::{ApiState, ApiStateBuilder, ApiStateError};
