//! Core type definitions for chunksync

mod error;
mod task;
mod verdict;

pub use error::SyncError;
pub use task::FileTask;
pub use verdict::{DetectionMode, DetectionVerdict, VerdictReason};
