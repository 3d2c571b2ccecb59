//! # Runtime
//!
//! Standard [Tokio](https://tokio.rs) runtime profiles for the workspace.
//!
//! * **Default**: worker threads from `TOKIO_WORKER_THREADS` or available parallelism.
//! * **High Performance**: larger stacks and longer keep-alive for busy servers.
//! * **Memory Efficient**: half the workers and small stacks.
//! * **I/O Bound**: the file server profile. `tokio::fs` runs every call on the blocking
//!   pool, so this profile raises the blocking-thread ceiling and keeps those threads warm.
//!
//! ```rust,ignore
//! #[fgate_runtime::main(io_bound)]
//! async fn main() -> anyhow::Result<()> {
//!     Ok(())
//! }
//! ```

pub use anyhow::Result;
pub use fgate_derive::main;

use anyhow::anyhow;
use std::{sync::OnceLock, thread::available_parallelism, time::Duration};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

const DEFAULT_WORKER_THREADS: usize = 4;
const MAX_WORKER_THREADS: usize = 1024;
/// 3 `MiB`.
const DEFAULT_STACK_SIZE: usize = 3 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 1024 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
/// Tokio's own default for the blocking pool.
const DEFAULT_BLOCKING_THREADS: usize = 512;
const MAX_BLOCKING_THREADS: usize = 4096;
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(60);

static WORKER_THREADS: OnceLock<usize> = OnceLock::new();

fn detected_worker_threads() -> usize {
    *WORKER_THREADS.get_or_init(|| {
        std::env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0 && n <= MAX_WORKER_THREADS)
            .unwrap_or_else(|| {
                available_parallelism()
                    .map(std::num::NonZero::get)
                    .unwrap_or(DEFAULT_WORKER_THREADS)
            })
    })
}

/// Tokio runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    pub max_blocking_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: detected_worker_threads(),
            max_blocking_threads: DEFAULT_BLOCKING_THREADS,
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: "fgate-worker".to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn high_performance() -> Self {
        Self {
            stack_size: 4 * 1024 * 1024,
            thread_name: "fgate-hp".to_owned(),
            thread_keep_alive: Duration::from_secs(300),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn memory_efficient() -> Self {
        Self {
            worker_threads: (detected_worker_threads() / 2).max(1),
            max_blocking_threads: 64,
            stack_size: 2 * 1024 * 1024,
            thread_name: "fgate-mem".to_owned(),
            thread_keep_alive: Duration::from_secs(30),
        }
    }

    /// Profile for workloads dominated by filesystem calls.
    #[must_use]
    pub fn io_bound() -> Self {
        Self {
            max_blocking_threads: 1024,
            stack_size: 2 * 1024 * 1024,
            thread_name: "fgate-io".to_owned(),
            thread_keep_alive: Duration::from_secs(120),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = clamp(threads, 1, MAX_WORKER_THREADS);
        self
    }

    #[must_use]
    pub const fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = clamp(threads, 1, MAX_BLOCKING_THREADS);
        self
    }

    #[must_use]
    pub const fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = clamp(size, MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.thread_name = name;
        }
        self
    }

    #[must_use]
    pub const fn with_thread_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.thread_keep_alive = keep_alive;
        self
    }

    /// Re-applies every bound; used on configs assembled by hand.
    fn normalized(&self) -> Self {
        self.clone()
            .with_worker_threads(self.worker_threads)
            .with_max_blocking_threads(self.max_blocking_threads)
            .with_stack_size(self.stack_size)
            .with_thread_name(self.thread_name.clone())
    }
}

const fn clamp(value: usize, min: usize, max: usize) -> usize {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Builds a multi-thread runtime with every driver enabled.
///
/// # Errors
/// Returns an error if the OS refuses to spawn the worker threads.
pub fn build_runtime_with_config(config: &RuntimeConfig) -> Result<Runtime> {
    let config = config.normalized();
    debug!(config = ?config, "Building tokio runtime");

    Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .max_blocking_threads(config.max_blocking_threads)
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive)
        .enable_all()
        .build()
        .map_err(|e| anyhow!("Failed to initialize runtime: {e}"))
}
