use crate::error::{StorageError, StorageErrorExt};
use crate::security::is_tmp_name;
use std::cmp::Ordering;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::debug;

/// Metadata view of one directory child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    /// `Some` for files, `None` for directories.
    pub size: Option<u64>,
    pub modified: SystemTime,
}

impl FileEntry {
    /// Directories before files, then by name byte-wise.
    fn listing_order(&self, other: &Self) -> Ordering {
        other.is_dir.cmp(&self.is_dir).then_with(|| self.name.cmp(&other.name))
    }
}

/// Reads the immediate children of `dir`, which must be an existing directory.
///
/// Symlinks, special files, non UTF-8 names and in-flight upload files are skipped, as
/// are entries removed between the scan and their metadata lookup.
pub(crate) async fn read_entries(dir: &Path) -> Result<Vec<FileEntry>, StorageError> {
    let mut reader =
        fs::read_dir(dir).await.context(format!("Failed to open {}", dir.display()))?;
    let mut entries = Vec::new();

    while let Some(entry) =
        reader.next_entry().await.context(format!("Failed to scan {}", dir.display()))?
    {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if !file_type.is_dir() && !file_type.is_file() {
            continue;
        }

        let name = match entry.file_name().into_string() {
            Ok(name) if !is_tmp_name(&name) => name,
            Ok(_) => continue,
            Err(raw) => {
                debug!(name = ?raw, "Skipping entry with a non UTF-8 name");
                continue;
            },
        };

        let Ok(metadata) = entry.metadata().await else {
            continue;
        };

        entries.push(FileEntry {
            name,
            is_dir: file_type.is_dir(),
            size: file_type.is_file().then(|| metadata.len()),
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
        });
    }

    entries.sort_by(FileEntry::listing_order);
    Ok(entries)
}
