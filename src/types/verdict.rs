//! Change-detection types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy used to decide whether a file pair needs copying.
///
/// Run-scoped: one mode applies to every file in a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Size plus modification time truncated to whole seconds
    #[default]
    Fast,

    /// Full-content SHA-256 comparison
    Hash,
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMode::Fast => write!(f, "fast"),
            DetectionMode::Hash => write!(f, "hash"),
        }
    }
}

/// Why a verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictReason {
    NewFile,
    MetadataUnreadable,
    IdenticalSizeTime,
    SizeOrTimeDiffers,
    HashFailed,
    IdenticalHash,
    ContentDiffers,
}

impl VerdictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictReason::NewFile => "new file",
            VerdictReason::MetadataUnreadable => "metadata unreadable",
            VerdictReason::IdenticalSizeTime => "identical (size+time)",
            VerdictReason::SizeOrTimeDiffers => "size or time differs",
            VerdictReason::HashFailed => "hash computation failed",
            VerdictReason::IdenticalHash => "identical (hash)",
            VerdictReason::ContentDiffers => "content differs",
        }
    }
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Copy/skip decision for one file pair. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionVerdict {
    pub should_copy: bool,
    pub reason: VerdictReason,

    /// Source SHA-256 (hex), when Hash mode computed it
    pub source_digest: Option<String>,
}

impl DetectionVerdict {
    pub fn copy(reason: VerdictReason) -> Self {
        Self {
            should_copy: true,
            reason,
            source_digest: None,
        }
    }

    pub fn skip(reason: VerdictReason) -> Self {
        Self {
            should_copy: false,
            reason,
            source_digest: None,
        }
    }

    pub fn with_digest(mut self, digest: String) -> Self {
        self.source_digest = Some(digest);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_mode_display_matches_cli_value() {
        use clap::ValueEnum;

        for mode in DetectionMode::value_variants() {
            let value = mode.to_possible_value().unwrap();
            assert_eq!(value.get_name(), mode.to_string());
        }
        assert_eq!(
            DetectionMode::from_str("HASH", true),
            Ok(DetectionMode::Hash)
        );
    }

    #[test]
    fn test_detection_mode_serde_is_lowercase() {
        let json = serde_json::to_string(&DetectionMode::Hash).unwrap();
        assert_eq!(json, "\"hash\"");
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(VerdictReason::NewFile.to_string(), "new file");
        assert_eq!(VerdictReason::IdenticalSizeTime.to_string(), "identical (size+time)");
        assert_eq!(VerdictReason::HashFailed.to_string(), "hash computation failed");
    }

    #[test]
    fn test_verdict_constructors() {
        let v = DetectionVerdict::skip(VerdictReason::IdenticalHash).with_digest("ab".into());
        assert!(!v.should_copy);
        assert_eq!(v.source_digest.as_deref(), Some("ab"));
        assert!(DetectionVerdict::copy(VerdictReason::NewFile).should_copy);
    }
}
