//! Kernel utilities shared across slices.
//! Keep this crate lightweight: configuration loading, the shared-key gate and, behind the
//! `server` feature, the Axum state, auth middleware and service routes.
//!
//! ## Config loading
//! ```rust,no_run
//! use fgate_kernel::config::load_config;
//! use fgate_kernel::domain::config::ApiConfig;
//!
//! let cfg: ApiConfig = load_config(Some("server")).unwrap();
//! println!("serving {}", cfg.storage.root.display());
//! ```
pub mod config;
pub mod security;
#[cfg(feature = "server")]
pub mod server;

pub use fgate_domain as domain;
