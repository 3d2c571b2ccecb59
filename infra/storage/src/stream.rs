//! Byte-range parsing and bounded, chunked file streaming.

use crate::error::StorageError;
use bytes::Bytes;
use futures::Stream;
use mime_guess::Mime;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::Take;
use tokio_util::io::ReaderStream;

/// Inclusive `[start, end]` byte offsets, always within the file they were parsed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parses a single-range `Range` header value against a file of `size` bytes.
    ///
    /// Accepts `bytes=a-b`, `bytes=a-` and the suffix form `bytes=-n`.
    ///
    /// # Errors
    /// * [`StorageError::MalformedRange`] for another unit, multiple ranges or
    ///   non-numeric offsets.
    /// * [`StorageError::RangeNotSatisfiable`] when the range does not fit the file,
    ///   including any range on an empty file and a zero-length suffix.
    pub fn parse(spec: &str, size: u64) -> Result<Self, StorageError> {
        let spec = spec.trim();
        let Some(set) = spec.strip_prefix("bytes=") else {
            return Err(malformed(spec, "unsupported range unit"));
        };
        if set.contains(',') {
            return Err(malformed(spec, "multiple ranges are not supported"));
        }
        let Some((first, last)) = set.split_once('-') else {
            return Err(malformed(spec, "missing '-'"));
        };
        let (first, last) = (first.trim(), last.trim());

        let range = match (first.is_empty(), last.is_empty()) {
            (true, true) => return Err(malformed(spec, "empty range")),
            (true, false) => {
                let suffix = offset(spec, last, size)?;
                if suffix == 0 || size == 0 {
                    return Err(unsatisfiable(spec, size));
                }
                Self { start: size.saturating_sub(suffix), end: size - 1 }
            },
            (false, open_end) => {
                let start = offset(spec, first, size)?;
                let end = if open_end {
                    size.checked_sub(1).ok_or_else(|| unsatisfiable(spec, size))?
                } else {
                    offset(spec, last, size)?
                };
                Self { start, end }
            },
        };

        if range.start > range.end || range.end >= size {
            return Err(unsatisfiable(spec, size));
        }
        Ok(range)
    }

    /// Number of bytes covered, never zero.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

fn offset(spec: &str, digits: &str, size: u64) -> Result<u64, StorageError> {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(spec, "offset is not a number"));
    }
    // All digits, so the only failure left is overflow.
    digits.parse().map_err(|_| unsatisfiable(spec, size))
}

fn malformed(spec: &str, reason: &'static str) -> StorageError {
    StorageError::MalformedRange { message: spec.to_owned().into(), context: Some(reason.into()) }
}

fn unsatisfiable(spec: &str, size: u64) -> StorageError {
    StorageError::RangeNotSatisfiable { message: spec.to_owned().into(), size, context: None }
}

/// Whether a read covers the whole file or a sub-range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Full,
    Partial,
}

/// An opened read: response metadata plus the lazily produced body.
#[derive(Debug)]
pub struct FileStream {
    /// Last segment of the resolved path.
    pub name: String,
    pub status: ReadStatus,
    /// Present iff `status` is [`ReadStatus::Partial`].
    pub range: Option<ByteRange>,
    /// Total size of the file.
    pub size: u64,
    /// Bytes the body will yield.
    pub content_length: u64,
    pub content_type: Mime,
    pub modified: SystemTime,
    pub body: ChunkStream,
}

impl FileStream {
    /// `bytes start-end/size` for partial reads.
    #[must_use]
    pub fn content_range(&self) -> Option<String> {
        self.range.map(|r| format!("bytes {}-{}/{}", r.start, r.end, self.size))
    }
}

/// One-shot stream of at most `remaining` bytes from an owned file handle.
///
/// Chunks are at most the configured chunk size. If the file ends before `remaining`
/// bytes were produced the stream yields [`io::ErrorKind::UnexpectedEof`] once and then
/// terminates. Dropping the stream closes the file.
pub struct ChunkStream {
    inner: ReaderStream<Take<File>>,
    remaining: u64,
}

impl ChunkStream {
    /// `file` must already be positioned at the first byte to send.
    pub(crate) fn new(file: File, length: u64, chunk_size: usize) -> Self {
        use tokio::io::AsyncReadExt;

        Self { inner: ReaderStream::with_capacity(file.take(length), chunk_size), remaining: length }
    }

    /// Bytes not yet yielded.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Stream for ChunkStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.remaining = this.remaining.saturating_sub(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            },
            Some(Err(err)) => {
                this.remaining = 0;
                Poll::Ready(Some(Err(err)))
            },
            None => {
                let missing = std::mem::take(&mut this.remaining);
                Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended {missing} bytes before the requested range"),
                ))))
            },
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.remaining == 0 { (0, Some(0)) } else { (1, None) }
    }
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream").field("remaining", &self.remaining).finish_non_exhaustive()
    }
}
