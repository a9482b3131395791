//! FileTask - one source file scheduled for a run

use std::path::{Path, PathBuf};

/// A regular file found under the source root, paired with its target location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileTask {
    /// Absolute path of the source file
    pub source_path: PathBuf,

    /// Path relative to the source root
    pub relative_path: PathBuf,

    /// Absolute path the file is copied to
    pub target_path: PathBuf,
}

impl FileTask {
    /// Build a task from a relative path and the two roots.
    pub fn new(source_root: &Path, target_root: &Path, relative_path: PathBuf) -> Self {
        Self {
            source_path: source_root.join(&relative_path),
            target_path: target_root.join(&relative_path),
            relative_path,
        }
    }

    /// Final path component, for status lines.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.relative_path.display().to_string())
    }
}
