use crate::error::StorageError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Prefix of in-flight upload files: `.fgtmp.{pid}.{counter}`.
const TMP_PREFIX: &str = ".fgtmp.";

/// A location proven to be the storage root or one of its descendants.
///
/// Only the resolver constructs values of this type, so holding one is the proof that
/// confinement was checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    absolute: PathBuf,
    relative: String,
}

impl ConfinedPath {
    /// Physical location on disk.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// Normalized root-relative form, segments joined by `/`. Empty for the root itself.
    #[must_use]
    pub fn relative(&self) -> &str {
        &self.relative
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Last segment, `None` for the root.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.relative.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Relative form of the containing directory. Empty for the root and its children.
    #[must_use]
    pub fn parent_relative(&self) -> &str {
        self.relative.rsplit_once('/').map_or("", |(parent, _)| parent)
    }
}

/// Resolves a client-supplied relative path against `root`.
///
/// `root` must already be canonical.
pub(crate) fn resolve(root: &Path, relative: &str) -> Result<ConfinedPath, StorageError> {
    let segments = normalize(relative)?;
    confine(root, &segments)
}

/// Resolves `name` as a direct child of the directory `dir`.
pub(crate) fn resolve_child(
    root: &Path,
    dir: &str,
    name: &str,
) -> Result<ConfinedPath, StorageError> {
    validate_name(name)?;
    let mut segments = normalize(dir)?;
    segments.push(name);
    confine(root, &segments)
}

/// Checks that `name` is a single plain segment.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    let invalid = |reason: &'static str| StorageError::InvalidName {
        message: name.to_owned().into(),
        context: Some(reason.into()),
    };

    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if name == "." || name == ".." {
        return Err(invalid("relative segment"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name contains a path separator"));
    }
    if name.contains('\0') {
        return Err(invalid("name contains a NUL byte"));
    }
    if is_tmp_name(name) {
        return Err(invalid("name is reserved for in-flight uploads"));
    }
    Ok(())
}

/// Lexically collapses `relative` into plain segments.
///
/// Both separator kinds are accepted. Empty segments and a leading drive designator are
/// dropped, `.` is skipped and `..` pops, failing when it would climb above the root.
fn normalize(relative: &str) -> Result<Vec<&str>, StorageError> {
    let mut segments: Vec<&str> = Vec::new();

    for (index, segment) in relative.split(['/', '\\']).filter(|s| !s.is_empty()).enumerate() {
        if index == 0 && is_drive_designator(segment) {
            continue;
        }
        if segment.contains('\0') {
            return Err(escape(relative, "path contains a NUL byte"));
        }
        match segment {
            "." => {},
            ".." => {
                if segments.pop().is_none() {
                    return Err(escape(relative, "'..' climbs above the root"));
                }
            },
            plain => segments.push(plain),
        }
    }

    Ok(segments)
}

fn is_drive_designator(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Joins the segments onto the root and verifies the deepest existing ancestor still lies
/// under the root once symlinks are resolved.
fn confine(root: &Path, segments: &[&str]) -> Result<ConfinedPath, StorageError> {
    let mut absolute = root.to_path_buf();
    absolute.extend(segments);
    let relative = segments.join("/");

    let mut current = Some(absolute.as_path());
    while let Some(path) = current {
        if path == root {
            break;
        }
        match std::fs::symlink_metadata(path) {
            Ok(_) => {
                let canonical = match path.canonicalize() {
                    Ok(canonical) => canonical,
                    Err(err) if err.kind() == ErrorKind::NotFound => {
                        return Err(escape(&relative, "dangling symlink"));
                    },
                    Err(err) => {
                        return Err(StorageError::Io {
                            source: err,
                            context: Some(format!("Failed to verify {}", path.display()).into()),
                        });
                    },
                };
                if !canonical.starts_with(root) {
                    return Err(escape(&relative, "symlink leads outside the root"));
                }
                break;
            },
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                current = path.parent();
            },
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to inspect {}", path.display()).into()),
                });
            },
        }
    }

    Ok(ConfinedPath { absolute, relative })
}

fn escape(relative: &str, reason: &'static str) -> StorageError {
    warn!(path = %relative, reason, "Path escape attempt");
    StorageError::PathEscape { message: relative.to_owned().into(), context: Some(reason.into()) }
}

/// Temp file name for an upload. The length does not depend on the target name.
pub(crate) fn tmp_name(pid: u32, counter: u64) -> String {
    format!("{TMP_PREFIX}{pid}.{counter}")
}

/// Matches exactly the shape produced by [`tmp_name`].
pub(crate) fn is_tmp_name(name: &str) -> bool {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    name.strip_prefix(TMP_PREFIX)
        .and_then(|rest| rest.split_once('.'))
        .is_some_and(|(pid, counter)| digits(pid) && digits(counter))
}
