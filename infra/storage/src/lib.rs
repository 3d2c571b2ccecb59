//! Scoped filesystem gateway.
//!
//! Exposes one directory tree (the *root*) to untrusted callers. Every path a caller
//! supplies is confined to the root before any filesystem call is made.
//!
//! # Core Features
//!
//! - **Confinement**: segment-wise resolution of `.`/`..` that refuses to climb above the
//!   root, followed by a physical check of the deepest existing ancestor so symlinks
//!   cannot leak out.
//! - **Listings**: directories first, then names byte-wise; symlinks, special files and
//!   in-flight uploads are hidden.
//! - **Range streaming**: single-range `Range` parsing and a bounded [`ChunkStream`]
//!   that owns its file handle.
//! - **Atomic uploads**: temp write, `fsync`, rename; temp files are removed on failure
//!   and stale ones are swept on startup.
//!
//! # Examples
//!
//! ```rust
//! use fgate_storage::{ReadStatus, Storage, StorageError};
//! use futures::TryStreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     let storage = Storage::builder().root(tmp.path()).connect().await?;
//!     storage.upload("docs", "a.txt", b"hello world").await?;
//!
//!     let read = storage.open("docs/a.txt", Some("bytes=0-4")).await?;
//!     assert_eq!(read.status, ReadStatus::Partial);
//!     assert_eq!(read.content_range().as_deref(), Some("bytes 0-4/11"));
//!
//!     let body: Vec<_> = read.body.try_collect().await?;
//!     assert_eq!(body.concat(), b"hello");
//!     Ok(())
//! }
//! ```

mod builder;
mod engine;
mod error;
mod listing;
mod maintenance;
mod security;
mod stream;

pub use builder::{DEFAULT_CHUNK_SIZE, StorageBuilder};
pub use engine::{MkdirOutcome, Renamed, Storage, Uploaded};
pub use error::{StorageError, StorageErrorExt};
pub use listing::FileEntry;
pub use security::ConfinedPath;
pub use stream::{ByteRange, ChunkStream, FileStream, ReadStatus};
