use crate::security::is_tmp_name;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Upload temp files younger than this may still belong to a running upload.
const STALE_AFTER: Duration = Duration::from_secs(300);

pub(crate) async fn purge_tmp(root: &Path) {
    let root = root.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&root, now, STALE_AFTER)).await {
        Ok((removed, failed)) if removed > 0 || failed > 0 => {
            info!(removed, failed, "Cleaned up stale upload files");
        },
        Err(e) => {
            error!(error = %e, "Upload temp cleanup task panicked");
        },
        _ => {},
    }
}

/// Removes stale temp files only. Directories, including empty ones, belong to users.
fn remove_stale(root: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let mut removed = 0;
    let mut failed = 0;

    WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|entry| is_tmp(entry) && is_stale(entry, now, threshold))
        .for_each(|entry| match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove stale upload file");
                failed += 1;
            },
        });

    (removed, failed)
}

fn is_tmp(entry: &DirEntry) -> bool {
    entry.file_type().is_file() && entry.file_name().to_str().is_some_and(is_tmp_name)
}

fn is_stale(entry: &DirEntry, now: SystemTime, threshold: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_none_or(|age| age > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stale_temp_files_are_removed() {
        let temp = tempfile::TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir(temp.path().join("empty")).unwrap();
        std::fs::write(nested.join(".fgtmp.88.3"), b"partial").unwrap();
        std::fs::write(nested.join("movie.mkv"), b"done").unwrap();

        let later = SystemTime::now() + Duration::from_secs(600);
        let (removed, failed) = remove_stale(temp.path(), later, STALE_AFTER);

        assert_eq!((removed, failed), (1, 0));
        assert!(nested.join("movie.mkv").exists());
        assert!(!nested.join(".fgtmp.88.3").exists());
        assert!(temp.path().join("empty").is_dir());
    }

    #[test]
    fn fresh_temp_files_survive() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join(".fgtmp.88.1"), b"in flight").unwrap();

        let (removed, _) = remove_stale(temp.path(), SystemTime::now(), STALE_AFTER);
        assert_eq!(removed, 0);
        assert!(temp.path().join(".fgtmp.88.1").exists());
    }
}
