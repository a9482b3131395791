//! Persisted cache of verified target digests
//!
//! Maps absolute target path -> SHA-256 hex. Entries are written after
//! Hash-mode copies (or Hash-mode matches) and are never revalidated on load,
//! so an entry can be stale if the target changed behind our back. The cache is
//! an optimization record, not a ledger: a missing or corrupt file loads as
//! empty, and the whole map is rewritten once at the end of a run.

use crate::types::SyncError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HashStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl HashStore {
    /// Load the store from `path`, yielding an empty map if it is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(map) => {
                    debug!(path = %path.display(), entries = map.len(), "loaded hash store");
                    map
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "hash store is corrupt; starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "hash store unreadable; starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries,
            dirty: false,
        }
    }

    /// In-memory upsert.
    pub fn record(&mut self, target: &Path, digest: impl Into<String>) {
        let digest = digest.into();
        let key = Self::key(target);
        if self.entries.get(&key) != Some(&digest) {
            self.entries.insert(key, digest);
            self.dirty = true;
        }
    }

    pub fn get(&self, target: &Path) -> Option<&str> {
        self.entries.get(&Self::key(target)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the backing file with the full map.
    ///
    /// Writes a sibling `.tmp` file and renames it over the old one, so a
    /// crash leaves either the previous store or a stray temp file.
    pub fn save(&mut self) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.error(e.to_string()))?;
        }

        let json =
            serde_json::to_string_pretty(&self.entries).map_err(|e| self.error(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(|e| self.error(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.error(e.to_string()))?;

        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.entries.len(), "saved hash store");
        Ok(())
    }

    /// True when there are records not yet written by `save`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn key(target: &Path) -> String {
        target.to_string_lossy().into_owned()
    }

    fn error(&self, message: String) -> SyncError {
        SyncError::HashStore {
            path: self.path.clone(),
            message,
        }
    }
}
