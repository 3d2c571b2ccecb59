//! # FileGate Server
//!
//! HTTP front for a single shared directory: listing, range reads, uploads and mutations,
//! all confined beneath one root and guarded by a shared API key.
//!
//! ## Example
//! ```no_run
//! use fgate_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder()
//!         .port(4583)
//!         .root("/srv/shared")
//!         .api_key("change-me")
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

mod router;

use anyhow::{Context, Result, bail};
use axum::Router;
use axum_server::Handle;
use fgate_kernel::domain::config::ApiConfig;
use fgate_kernel::server::ApiState;
use fgate_storage::Storage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// A fluent builder for configuring and initializing the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: ApiConfig,
}

impl ServerBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, cfg: ApiConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.cfg.server.port = port;
        self
    }

    /// Directory served to clients.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cfg.storage.root = root.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.cfg.security.api_key = key.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.cfg.security.api_key.trim().is_empty() {
            bail!("security.api_key must be set (FGATE__SECURITY__API_KEY)");
        }
        if self.cfg.storage.chunk_size == 0 {
            bail!("storage.chunk_size must be greater than zero");
        }
        if self.cfg.storage.max_upload_bytes == 0 {
            bail!("storage.max_upload_bytes must be greater than zero");
        }
        router::cors_layer(&self.cfg.security.cors)?;
        self.validate_ssl_config()
    }

    fn validate_ssl_config(&self) -> Result<()> {
        if let Some(ssl) = &self.cfg.server.ssl {
            if !ssl.cert.exists() {
                bail!("SSL certificate not found at: {}", ssl.cert.display());
            }
            if !ssl.key.exists() {
                bail!("SSL key not found at: {}", ssl.key.display());
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let metadata = ssl.key.metadata()?;
                if metadata.permissions().mode() & 0o077 != 0 {
                    tracing::warn!(
                        "SECURITY: SSL Private Key {} has insecure permissions (should be 600)",
                        ssl.key.display()
                    );
                }
            }
        }
        Ok(())
    }

    async fn init_storage(&self) -> Result<Storage> {
        let storage_cfg = &self.cfg.storage;
        Storage::builder()
            .create(storage_cfg.create)
            .chunk_size(storage_cfg.chunk_size)
            .root(storage_cfg.root.clone())
            .connect()
            .await
            .with_context(|| format!("Failed to open storage root {}", storage_cfg.root.display()))
    }

    /// Consumes the builder and initializes the server.
    ///
    /// # Process
    /// 1. Validates the credential, storage limits, CORS origins and TLS files
    /// 2. Opens the storage root, creating it when configured to
    /// 3. Constructs application state
    ///
    /// # Errors
    /// Returns an error if:
    /// * The API key is empty or a limit is zero
    /// * A CORS origin is not a valid header value
    /// * SSL certificate/key files are missing
    /// * The storage root cannot be created or is not a directory
    pub async fn build(self) -> Result<Server> {
        self.validate()?;

        info!(address = %self.cfg.server.socket_addr(), "Initializing server");

        let storage = self.init_storage().await?;
        let state = ApiState::builder()
            .config(self.cfg)
            .storage(storage)
            .build()
            .context("Failed to finalize API state")?;

        Ok(Server { state })
    }
}

/// A fully initialized server instance ready to run.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    state: ApiState,
}

impl Server {
    /// Returns a new [`ServerBuilder`] to configure the server.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// The fully layered application, without a listener.
    ///
    /// # Errors
    /// Returns an error if the CORS configuration is invalid.
    pub fn router(&self) -> Result<Router> {
        router::init(self.state.clone())
    }

    /// Starts the server and runs until the shutdown signal is received.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the configured address
    /// or if SSL/TLS setup fails.
    pub async fn run(self) -> Result<()> {
        let cfg = self.state.config.clone();
        let address = cfg.server.socket_addr();

        info!(
            address = %address,
            ssl = cfg.server.ssl.is_some(),
            root = %self.state.storage.root().display(),
            "Starting server"
        );

        let app = self.router()?;

        let handle = Handle::<SocketAddr>::new();
        let shutdown_handle = handle.clone();

        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e}");
                return;
            }
            info!("Shutdown signal received, starting graceful shutdown...");
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        if let Some(ssl_config) = &cfg.server.ssl {
            info!("Starting HTTPS server on https://{address}");

            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                &ssl_config.cert,
                &ssl_config.key,
            )
            .await
            .context("Failed to load SSL/TLS certificates")?;

            axum_server::bind_rustls(address, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        } else {
            info!("Starting HTTP server on http://{address}");

            axum_server::bind(address)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTP server failed")?;
        }

        info!("Server shutdown complete");
        Ok(())
    }

    /// Returns a reference to the application state.
    #[must_use]
    pub const fn state(&self) -> &ApiState {
        &self.state
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res?,
        res = terminate => res?,
    }

    Ok(())
}
