//! The [`Storage`] handle: every client-visible operation on the shared tree.
//!
//! Each operation resolves its arguments through the confinement checks in
//! [`crate::security`] before touching the filesystem.

use crate::builder::StorageBuilder;
use crate::error::{StorageError, StorageErrorExt};
use crate::listing::{self, FileEntry};
use crate::maintenance;
use crate::security::{self, ConfinedPath};
use crate::stream::{ByteRange, ChunkStream, FileStream, ReadStatus};
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use std::io::{ErrorKind, SeekFrom};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Shared state behind a [`Storage`] handle.
#[derive(Debug)]
pub struct StorageInner {
    /// Canonical root directory.
    pub(crate) root: PathBuf,
    /// Upper bound for a single streamed chunk.
    pub(crate) chunk_size: usize,
    pub(crate) tmp_counter: AtomicU64,
}

/// Cheaply cloneable handle to the shared directory tree.
///
/// ```rust
/// use fgate_storage::{Storage, StorageError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     let storage = Storage::builder().root(tmp.path().join("shared")).connect().await?;
///
///     storage.mkdir("", "docs").await?;
///     storage.upload("docs", "a.txt", b"hello world").await?;
///
///     let entries = storage.list("docs").await?;
///     assert_eq!(entries[0].size, Some(11));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
}

impl Deref for Storage {
    type Target = StorageInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// A committed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub path: ConfinedPath,
    pub size: u64,
}

/// Result of [`Storage::mkdir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MkdirOutcome {
    Created(ConfinedPath),
    AlreadyExists(ConfinedPath),
}

impl MkdirOutcome {
    #[must_use]
    pub const fn path(&self) -> &ConfinedPath {
        match self {
            Self::Created(path) | Self::AlreadyExists(path) => path,
        }
    }

    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Result of [`Storage::rename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renamed {
    pub from: ConfinedPath,
    pub to: ConfinedPath,
}

impl Storage {
    #[must_use = "The storage engine is not initialized until you call .connect()"]
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    /// Canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.inner.chunk_size
    }

    /// Confines a client-supplied relative path to the root.
    ///
    /// # Errors
    /// [`StorageError::PathEscape`] if the path would leave the root lexically or through
    /// a symlink; [`StorageError::Io`] if an existing ancestor cannot be inspected.
    pub fn resolve(&self, relative: &str) -> Result<ConfinedPath, StorageError> {
        security::resolve(&self.root, relative)
    }

    /// Lists the immediate children of `dir`, directories first.
    ///
    /// # Errors
    /// [`StorageError::NotFound`] if `dir` does not exist, [`StorageError::NotADirectory`]
    /// if it names a file.
    pub async fn list(&self, dir: &str) -> Result<Vec<FileEntry>, StorageError> {
        let dir = self.resolve(dir)?;
        let metadata = metadata_or_not_found(&dir).await?;
        if !metadata.is_dir() {
            return Err(StorageError::NotADirectory {
                message: dir.relative().to_owned().into(),
                context: None,
            });
        }

        let entries = listing::read_entries(dir.as_path()).await?;
        debug!(dir = %dir.relative(), count = entries.len(), "Listed directory");
        Ok(entries)
    }

    /// Opens `path` for streaming, optionally restricted to a `Range` header value.
    ///
    /// Memory use is bounded by the chunk size regardless of the file size.
    ///
    /// # Errors
    /// * [`StorageError::NotFound`] if the path is absent or is not a regular file.
    /// * [`StorageError::MalformedRange`] / [`StorageError::RangeNotSatisfiable`] for a bad
    ///   `range`.
    pub async fn open(&self, path: &str, range: Option<&str>) -> Result<FileStream, StorageError> {
        let target = self.resolve(path)?;
        let metadata = metadata_or_not_found(&target).await?;
        if !metadata.is_file() {
            return Err(not_found(&target));
        }

        let size = metadata.len();
        let range = range.map(|spec| ByteRange::parse(spec, size)).transpose()?;

        let mut file = fs::File::open(target.as_path())
            .await
            .context(format!("Failed to open {}", target.as_path().display()))?;

        let (status, start, content_length) = match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start))
                    .await
                    .context(format!("Failed to seek {}", target.as_path().display()))?;
                (ReadStatus::Partial, range.start, range.len())
            },
            None => (ReadStatus::Full, 0, size),
        };

        debug!(path = %target.relative(), start, length = content_length, size, "Opened file stream");

        Ok(FileStream {
            name: target.name().unwrap_or_default().to_owned(),
            status,
            range,
            size,
            content_length,
            content_type: mime_guess::from_path(target.as_path()).first_or_octet_stream(),
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
            body: ChunkStream::new(file, content_length, self.chunk_size),
        })
    }

    /// Stores `data` as `dir/filename`, replacing an existing file.
    ///
    /// # Errors
    /// See [`Storage::upload_stream`].
    pub async fn upload(
        &self,
        dir: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<Uploaded, StorageError> {
        let body = stream::once(async { Ok::<_, std::io::Error>(Bytes::copy_from_slice(data)) });
        self.upload_stream(dir, filename, body).await
    }

    /// Streams `body` into `dir/filename`, creating missing directories.
    ///
    /// The bytes land in a hidden temp file in the target directory, are synced, and are
    /// then renamed over the target, so readers see either the old or the new content.
    /// The temp file is removed if the body fails or the future is dropped.
    ///
    /// # Errors
    /// * [`StorageError::InvalidName`] if `filename` is not a single segment.
    /// * [`StorageError::Conflict`] if the target is a directory or a component of `dir`
    ///   is a file.
    /// * [`StorageError::Io`] for body or disk failures.
    pub async fn upload_stream<S, E>(
        &self,
        dir: &str,
        filename: &str,
        body: S,
    ) -> Result<Uploaded, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let target = security::resolve_child(&self.root, dir, filename)?;
        let parent = self.resolve(dir)?;
        ensure_dir(&parent).await?;

        if let Ok(existing) = fs::symlink_metadata(target.as_path()).await
            && existing.is_dir()
        {
            return Err(StorageError::Conflict {
                message: target.relative().to_owned().into(),
                context: Some("a directory with this name exists".into()),
            });
        }

        let (temp, file) = self.create_temp(parent.as_path()).await?;
        let size = write_body(temp.path(), file, body).await?;

        fs::rename(temp.path(), target.as_path()).await.context(format!(
            "Failed to commit {} -> {}",
            temp.path().display(),
            target.as_path().display()
        ))?;
        temp.disarm();
        sync_dir(parent.as_path()).await;

        debug!(path = %target.relative(), size, "Upload committed");
        Ok(Uploaded { path: target, size })
    }

    /// Deletes the file or empty directory `dir/name`. Never recursive.
    ///
    /// # Errors
    /// [`StorageError::NotFound`] if absent, [`StorageError::DirectoryNotEmpty`] for a
    /// directory with children.
    pub async fn delete(&self, dir: &str, name: &str) -> Result<ConfinedPath, StorageError> {
        let target = security::resolve_child(&self.root, dir, name)?;
        let metadata = symlink_metadata_or_not_found(&target).await?;

        if metadata.is_dir() {
            if has_children(target.as_path()).await? {
                return Err(directory_not_empty(&target));
            }
            match fs::remove_dir(target.as_path()).await {
                Ok(()) => {},
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => {
                    return Err(directory_not_empty(&target));
                },
                Err(err) => return Err(remove_failed(&target, err)),
            }
        } else {
            fs::remove_file(target.as_path()).await.map_err(|err| remove_failed(&target, err))?;
        }

        debug!(path = %target.relative(), dir = metadata.is_dir(), "Deleted entry");
        Ok(target)
    }

    /// Renames `dir/old_name` to `dir/new_name`. Refuses to overwrite.
    ///
    /// The existence check and the rename are separate calls; a concurrent creator of
    /// `new_name` may still be replaced.
    ///
    /// # Errors
    /// [`StorageError::NotFound`] if the source is absent, [`StorageError::Conflict`] if
    /// the destination exists.
    pub async fn rename(
        &self,
        dir: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<Renamed, StorageError> {
        let from = security::resolve_child(&self.root, dir, old_name)?;
        let to = security::resolve_child(&self.root, dir, new_name)?;
        symlink_metadata_or_not_found(&from).await?;

        if old_name == new_name {
            return Ok(Renamed { from, to });
        }

        if fs::symlink_metadata(to.as_path()).await.is_ok() {
            return Err(StorageError::Conflict {
                message: to.relative().to_owned().into(),
                context: Some("rename target already exists".into()),
            });
        }

        fs::rename(from.as_path(), to.as_path()).await.context(format!(
            "Failed to rename {} -> {}",
            from.as_path().display(),
            to.as_path().display()
        ))?;

        debug!(from = %from.relative(), to = %to.relative(), "Renamed entry");
        Ok(Renamed { from, to })
    }

    /// Ensures `dir/name` exists as a directory, creating `dir` as needed.
    ///
    /// # Errors
    /// [`StorageError::Conflict`] if a non-directory occupies the path or one of its
    /// ancestors.
    pub async fn mkdir(&self, dir: &str, name: &str) -> Result<MkdirOutcome, StorageError> {
        let target = security::resolve_child(&self.root, dir, name)?;

        match fs::symlink_metadata(target.as_path()).await {
            Ok(metadata) if metadata.is_dir() => return Ok(MkdirOutcome::AlreadyExists(target)),
            Ok(_) => {
                return Err(StorageError::Conflict {
                    message: target.relative().to_owned().into(),
                    context: Some("a file with this name exists".into()),
                });
            },
            Err(_) => {},
        }

        ensure_dir(&target).await?;
        debug!(path = %target.relative(), "Created directory");
        Ok(MkdirOutcome::Created(target))
    }

    /// Opens a fresh temp file in `dir`. Names left over by a crashed process are skipped.
    async fn create_temp(&self, dir: &Path) -> Result<(TempFile, fs::File), StorageError> {
        let pid = std::process::id();
        let mut attempt = 0;
        loop {
            let counter = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
            let path = dir.join(security::tmp_name(pid, counter));
            match fs::OpenOptions::new().create_new(true).write(true).open(&path).await {
                Ok(file) => return Ok((TempFile::new(path), file)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists && attempt < TEMP_ATTEMPTS => {
                    debug!(path = %path.display(), "Upload temp name taken, retrying");
                    attempt += 1;
                },
                Err(err) => {
                    return Err(StorageError::Io {
                        source: err,
                        context: Some(format!("Temp creation failed: {}", path.display()).into()),
                    });
                },
            }
        }
    }

    /// Removes stale upload temp files left behind by interrupted processes.
    pub async fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.root).await;
    }
}

const TEMP_ATTEMPTS: u32 = 64;

/// Deletes the wrapped path on drop unless disarmed.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    const fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed
            && let Err(err) = std::fs::remove_file(&self.path)
            && err.kind() != ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %err, "Failed to remove upload temp file");
        }
    }
}

async fn write_body<S, E>(path: &Path, mut file: fs::File, body: S) -> Result<u64, StorageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    debug!(path = %path.display(), "Writing upload body");
    let mut body = std::pin::pin!(body);
    let mut size = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(std::io::Error::other).context("Upload body failed")?;
        file.write_all(&chunk).await.context("Write failed")?;
        size += chunk.len() as u64;
    }

    file.flush().await.context("Flush failed")?;
    file.sync_all().await.context("Hardware sync failed")?;
    Ok(size)
}

async fn ensure_dir(dir: &ConfinedPath) -> Result<(), StorageError> {
    match fs::create_dir_all(dir.as_path()).await {
        Ok(()) => Ok(()),
        Err(err) if matches!(err.kind(), ErrorKind::AlreadyExists | ErrorKind::NotADirectory) => {
            Err(StorageError::Conflict {
                message: dir.relative().to_owned().into(),
                context: Some("a file occupies part of the directory path".into()),
            })
        },
        Err(err) => Err(StorageError::Io {
            source: err,
            context: Some(format!("Failed to create {}", dir.as_path().display()).into()),
        }),
    }
}

async fn has_children(dir: &Path) -> Result<bool, StorageError> {
    let mut reader = fs::read_dir(dir).await.context(format!("Failed to open {}", dir.display()))?;
    Ok(reader.next_entry().await.context(format!("Failed to scan {}", dir.display()))?.is_some())
}

async fn metadata_or_not_found(path: &ConfinedPath) -> Result<std::fs::Metadata, StorageError> {
    fs::metadata(path.as_path()).await.map_err(|err| lookup_failed(path, err))
}

async fn symlink_metadata_or_not_found(
    path: &ConfinedPath,
) -> Result<std::fs::Metadata, StorageError> {
    fs::symlink_metadata(path.as_path()).await.map_err(|err| lookup_failed(path, err))
}

fn lookup_failed(path: &ConfinedPath, err: std::io::Error) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => not_found(path),
        _ => StorageError::Io {
            source: err,
            context: Some(format!("Failed to stat {}", path.as_path().display()).into()),
        },
    }
}

fn not_found(path: &ConfinedPath) -> StorageError {
    StorageError::NotFound { message: path.relative().to_owned().into(), context: None }
}

fn directory_not_empty(path: &ConfinedPath) -> StorageError {
    StorageError::DirectoryNotEmpty { message: path.relative().to_owned().into(), context: None }
}

fn remove_failed(path: &ConfinedPath, err: std::io::Error) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound => not_found(path),
        _ => StorageError::Io {
            source: err,
            context: Some(format!("Failed to delete {}", path.as_path().display()).into()),
        },
    }
}

async fn sync_dir(path: &Path) {
    match fs::File::open(path).await {
        Ok(dir) => {
            if let Err(err) = dir.sync_all().await {
                debug!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Directory open failed");
        },
    }
}
