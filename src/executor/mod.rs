//! Executor module for byte transfer
//!
//! One file at a time, one stream at a time. Parallel transfers are avoided on
//! purpose: network-attached targets degrade badly under concurrent streams.

pub mod control;
pub mod copy;

pub use control::ControlFlags;
pub use copy::{ChunkedCopier, CopyOutcome, DEFAULT_CHUNK_SIZE, DEFAULT_POLL_INTERVAL};
