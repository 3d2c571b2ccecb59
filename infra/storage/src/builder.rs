use crate::engine::{Storage, StorageInner};
use crate::error::{StorageError, StorageErrorExt};
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::fs;
use tracing::info;

/// Default read chunk, 1 `MiB`.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
const MIN_CHUNK_SIZE: usize = 4 * 1024;
const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
struct StorageConfig {
    create: bool,
    chunk_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { create: true, chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct StorageBuilder<S: Sealed = NoRoot> {
    state: S,
    config: StorageConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> StorageBuilder<S> {
    #[must_use = "Sets whether a missing root directory is created on connect"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    /// Upper bound for a streamed chunk, clamped to 4 `KiB`..=64 `MiB`.
    #[must_use = "Sets the read chunk size"]
    pub const fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = if bytes < MIN_CHUNK_SIZE {
            MIN_CHUNK_SIZE
        } else if bytes > MAX_CHUNK_SIZE {
            MAX_CHUNK_SIZE
        } else {
            bytes
        };
        self
    }

    fn transition<N: Sealed>(self, state: N) -> StorageBuilder<N> {
        StorageBuilder { state, config: self.config }
    }
}

impl StorageBuilder<NoRoot> {
    #[must_use = "Creates a new storage builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the shared root directory"]
    pub fn root(self, path: impl Into<PathBuf>) -> StorageBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }
}

impl StorageBuilder<WithRoot> {
    /// Establishes the root and returns a ready [`Storage`] handle.
    ///
    /// Creates the root when `create(true)` is set, canonicalizes it so later
    /// confinement checks compare physical paths, and sweeps stale upload temp files.
    /// The sweep never fails the connect.
    ///
    /// # Errors
    ///
    /// * [`StorageError::Io`] if the root cannot be created or resolved.
    /// * [`StorageError::NotADirectory`] if the root exists but is not a directory.
    pub async fn connect(self) -> Result<Storage, StorageError> {
        let root = &self.state.0;

        if self.config.create {
            fs::create_dir_all(root)
                .await
                .context(format!("Failed to bootstrap storage root: {}", root.display()))?;
        }

        let canonical = fs::canonicalize(root)
            .await
            .context(format!("Failed to resolve storage root: {}", root.display()))?;

        let metadata = fs::metadata(&canonical)
            .await
            .context(format!("Failed to inspect storage root: {}", canonical.display()))?;
        if !metadata.is_dir() {
            return Err(StorageError::NotADirectory {
                message: "storage root".into(),
                context: Some(canonical.display().to_string().into()),
            });
        }

        info!(root = %canonical.display(), chunk_size = self.config.chunk_size, "Storage root ready");

        let storage = Storage {
            inner: Arc::new(StorageInner {
                root: canonical,
                chunk_size: self.config.chunk_size,
                tmp_counter: AtomicU64::new(1),
            }),
        };

        storage.purge_tmp().await;

        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_clamped() {
        assert_eq!(StorageBuilder::new().chunk_size(0).config.chunk_size, MIN_CHUNK_SIZE);
        assert_eq!(StorageBuilder::new().chunk_size(usize::MAX).config.chunk_size, MAX_CHUNK_SIZE);
        assert_eq!(StorageBuilder::new().config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[tokio::test]
    async fn missing_root_without_create_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = Storage::builder()
            .root(temp.path().join("absent"))
            .create(false)
            .connect()
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[tokio::test]
    async fn file_root_is_rejected() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();

        let err = Storage::builder().root(&file).create(false).connect().await.unwrap_err();
        assert!(matches!(err, StorageError::NotADirectory { .. }));
    }
}
