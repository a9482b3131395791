//! Error types for chunksync

use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for chunksync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Standard IO error (automatically converted via #[from])
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error (logic checks)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Failed to read from a source file
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write to a target file
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Hash cache could not be persisted
    #[error("Hash store error at {path}: {message}")]
    HashStore { path: PathBuf, message: String },

    /// Source tree could not be enumerated
    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    /// Stop was raised while hashing
    #[error("Hashing {path} was interrupted by stop")]
    Interrupted { path: PathBuf },
}

impl SyncError {
    /// Check if this error is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(self, SyncError::Validation(_) | SyncError::Config(_))
    }

    /// Check if this error is related to permissions
    pub fn is_permission_error(&self) -> bool {
        self.io_kind() == Some(ErrorKind::PermissionDenied)
    }

    /// Underlying `io::ErrorKind`, when the error wraps one.
    pub fn io_kind(&self) -> Option<ErrorKind> {
        match self {
            SyncError::Io(err)
            | SyncError::Read { source: err, .. }
            | SyncError::Write { source: err, .. } => Some(err.kind()),
            _ => None,
        }
    }

    /// Short human-readable description used in per-file status lines.
    pub fn humanize(&self) -> String {
        if self.is_permission_error() {
            return "permission denied".to_string();
        }
        match self.io_kind() {
            Some(ErrorKind::NotFound) => "file or directory was not found".to_string(),
            Some(ErrorKind::WriteZero | ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof) => {
                "transfer was interrupted before completion".to_string()
            }
            _ => self.to_string(),
        }
    }
}
