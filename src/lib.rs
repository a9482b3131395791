//! # chunksync - Incremental Directory Sync
//!
//! Copies only what changed from a source tree into a target tree, one file
//! at a time, in durable chunks that can be paused, stopped, and resumed.
//!
//! The pieces, leaf first:
//! - [`scanner`] lists the regular files of the source tree
//! - [`diff`] decides copy or skip per file (size+mtime or SHA-256)
//! - [`hash`] hashes files and keeps the persisted digest cache
//! - [`executor`] streams bytes and honors the pause/stop flags
//! - [`commands::sync`] runs the whole thing on a worker thread and reports
//!   through a channel

pub mod audit;
pub mod commands;
pub mod config;
pub mod diff;
pub mod executor;
pub mod hash;
pub mod scanner;
pub mod types;
pub mod ui;

// Re-export commonly used types
pub use commands::sync::{RunCounters, RunState, RunSummary, SyncEvent, SyncRun};
pub use config::Config;
pub use executor::{ChunkedCopier, ControlFlags, CopyOutcome};
pub use types::{DetectionMode, DetectionVerdict, FileTask, SyncError, VerdictReason};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
