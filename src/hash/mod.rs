//! Hashing utilities

mod store;

pub use store::HashStore;

use crate::executor::ControlFlags;
use crate::types::SyncError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Compute the SHA-256 of a file as lowercase hex
///
/// The file is streamed in 64KB chunks, never loaded whole.
///
/// # Example
/// ```no_run
/// use chunksync::hash::compute_hash;
/// use std::path::Path;
///
/// let digest = compute_hash(Path::new("file.txt"))?;
/// assert_eq!(digest.len(), 64);
/// # Ok::<(), chunksync::SyncError>(())
/// ```
pub fn compute_hash(file_path: &Path) -> Result<String, SyncError> {
    hash_file(file_path, || false)
}

/// Like [`compute_hash`], but gives up with [`SyncError::Interrupted`] once
/// stop is raised. The flag is checked before every buffer.
pub fn compute_hash_until_stopped(
    file_path: &Path,
    control: &ControlFlags,
) -> Result<String, SyncError> {
    hash_file(file_path, || control.is_stop_requested())
}

fn hash_file(file_path: &Path, should_stop: impl Fn() -> bool) -> Result<String, SyncError> {
    let mut file = File::open(file_path).map_err(|source| SyncError::Read {
        path: file_path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        if should_stop() {
            return Err(SyncError::Interrupted {
                path: file_path.to_path_buf(),
            });
        }

        let bytes_read = file.read(&mut buffer).map_err(|source| SyncError::Read {
            path: file_path.to_path_buf(),
            source,
        })?;

        if bytes_read == 0 {
            break; // EOF
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
