//! Recursive source walker

use crate::types::{FileTask, SyncError};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// List every regular file under `source_root` as a [`FileTask`] targeting `target_root`.
///
/// Walks depth-first using the `ignore` crate with all of its filters turned
/// off: hidden files and `.gitignore`d files are synced like anything else.
/// Symlinks are not followed and are not listed. Order follows the filesystem
/// enumeration and is not sorted.
///
/// # Errors
/// An unreadable root is not fatal: it is logged and an empty list is
/// returned, so the run reports "no files found" instead of aborting. Errors
/// on individual entries below the root are logged and the walk continues.
pub fn list_files(source_root: &Path, target_root: &Path) -> Vec<FileTask> {
    match try_list_files(source_root, target_root) {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(error = %e, "source listing failed; treating as empty");
            Vec::new()
        }
    }
}

/// Like [`list_files`], but surfaces a root that cannot be read.
pub fn try_list_files(source_root: &Path, target_root: &Path) -> Result<Vec<FileTask>, SyncError> {
    let start_time = Instant::now();

    fs::read_dir(source_root).map_err(|e| SyncError::Walk {
        path: source_root.to_path_buf(),
        message: e.to_string(),
    })?;

    let walker = ignore::WalkBuilder::new(source_root)
        .standard_filters(false)
        .follow_links(false)
        .build();

    let mut tasks = Vec::new();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "error during directory traversal; continuing");
                continue;
            }
        };

        // Only regular files; directories, symlinks and special files are skipped.
        match entry.file_type() {
            Some(ft) if ft.is_file() => {}
            _ => continue,
        }

        let relative_path = match entry.path().strip_prefix(source_root) {
            Ok(p) => p.to_path_buf(),
            Err(_) => {
                warn!(
                    path = %entry.path().display(),
                    "entry is outside the source root; skipping"
                );
                continue;
            }
        };

        tasks.push(FileTask::new(source_root, target_root, relative_path));
    }

    debug!(
        root = %source_root.display(),
        files = tasks.len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "source walk finished"
    );

    Ok(tasks)
}
