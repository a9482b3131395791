//! Per-pair change detection

use crate::executor::ControlFlags;
use crate::hash::compute_hash_until_stopped;
use crate::types::{DetectionMode, DetectionVerdict, SyncError, VerdictReason};
use filetime::FileTime;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Decide whether `source` must be copied over `target`
///
/// 1. **Missing target** → copy ("new file")
/// 2. **Fast**: size and mtime floored to whole seconds must both match to
///    skip. Sub-second jitter between filesystems never forces a copy.
/// 3. **Hash**: full-content SHA-256 of both sides must match to skip.
///
/// Uncertainty fails open: unreadable metadata or a failed hash yields a copy,
/// never a silent skip. For fixed file states and mode the result is repeatable.
///
/// Fast mode cannot see corruption that keeps size and mtime intact; that is
/// what Hash mode is for.
pub fn decide(source: &Path, target: &Path, mode: DetectionMode) -> DetectionVerdict {
    decide_until_stopped(source, target, mode, &ControlFlags::new())
}

/// [`decide`] for use inside a run: Hash mode abandons hashing once stop is
/// raised and returns a copy verdict, which the caller is expected to drop.
pub fn decide_until_stopped(
    source: &Path,
    target: &Path,
    mode: DetectionMode,
    control: &ControlFlags,
) -> DetectionVerdict {
    // try_exists distinguishes "absent" from "can't tell"; the latter fails open below.
    if matches!(target.try_exists(), Ok(false)) {
        return DetectionVerdict::copy(VerdictReason::NewFile);
    }

    match mode {
        DetectionMode::Fast => decide_fast(source, target),
        DetectionMode::Hash => decide_hash(source, target, control),
    }
}

fn decide_fast(source: &Path, target: &Path) -> DetectionVerdict {
    let (src_meta, dst_meta) = match (fs::metadata(source), fs::metadata(target)) {
        (Ok(s), Ok(d)) => (s, d),
        (Err(e), _) | (_, Err(e)) => {
            warn!(
                source = %source.display(),
                target_path = %target.display(),
                error = %e,
                "failed to read metadata; copying"
            );
            return DetectionVerdict::copy(VerdictReason::MetadataUnreadable);
        }
    };

    // FileTime keeps nanos in [0, 1e9), so unix_seconds() is already floor(mtime).
    let src_secs = FileTime::from_last_modification_time(&src_meta).unix_seconds();
    let dst_secs = FileTime::from_last_modification_time(&dst_meta).unix_seconds();

    if src_meta.len() == dst_meta.len() && src_secs == dst_secs {
        DetectionVerdict::skip(VerdictReason::IdenticalSizeTime)
    } else {
        DetectionVerdict::copy(VerdictReason::SizeOrTimeDiffers)
    }
}

fn decide_hash(source: &Path, target: &Path, control: &ControlFlags) -> DetectionVerdict {
    let digests = compute_hash_until_stopped(source, control)
        .and_then(|s| compute_hash_until_stopped(target, control).map(|d| (s, d)));

    let (src_digest, dst_digest) = match digests {
        Ok(pair) => pair,
        Err(e @ SyncError::Interrupted { .. }) => {
            debug!(error = %e, "hashing abandoned after stop");
            return DetectionVerdict::copy(VerdictReason::HashFailed);
        }
        Err(e) => {
            warn!(error = %e, "hash computation failed; copying");
            return DetectionVerdict::copy(VerdictReason::HashFailed);
        }
    };

    if src_digest == dst_digest {
        DetectionVerdict::skip(VerdictReason::IdenticalHash).with_digest(src_digest)
    } else {
        DetectionVerdict::copy(VerdictReason::ContentDiffers).with_digest(src_digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::set_file_mtime;
    use tempfile::TempDir;

    fn write_with_mtime(path: &Path, content: &[u8], secs: i64, nanos: u32) {
        fs::write(path, content).unwrap();
        set_file_mtime(path, FileTime::from_unix_time(secs, nanos)).unwrap();
    }

    #[test]
    fn test_missing_target_is_new_file_in_both_modes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, b"data").unwrap();
        let dst = dir.path().join("absent.txt");

        for mode in [DetectionMode::Fast, DetectionMode::Hash] {
            let verdict = decide(&src, &dst, mode);
            assert!(verdict.should_copy);
            assert_eq!(verdict.reason, VerdictReason::NewFile);
        }
    }

    #[test]
    fn test_fast_ignores_sub_second_difference() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        write_with_mtime(&src, b"same", 1_700_000_000, 100_000_000);
        write_with_mtime(&dst, b"same", 1_700_000_000, 900_000_000);

        let verdict = decide(&src, &dst, DetectionMode::Fast);
        assert!(!verdict.should_copy);
        assert_eq!(verdict.reason, VerdictReason::IdenticalSizeTime);
    }

    #[test]
    fn test_fast_whole_second_difference_forces_copy() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        write_with_mtime(&src, b"same", 1_700_000_001, 0);
        write_with_mtime(&dst, b"same", 1_700_000_000, 999_999_999);

        let verdict = decide(&src, &dst, DetectionMode::Fast);
        assert!(verdict.should_copy);
        assert_eq!(verdict.reason, VerdictReason::SizeOrTimeDiffers);
    }

    #[test]
    fn test_fast_size_difference_forces_copy() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        write_with_mtime(&src, b"longer", 1_700_000_000, 0);
        write_with_mtime(&dst, b"short", 1_700_000_000, 0);

        assert!(decide(&src, &dst, DetectionMode::Fast).should_copy);
    }

    #[test]
    fn test_fast_unreadable_source_fails_open() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("b");
        fs::write(&dst, b"x").unwrap();

        let verdict = decide(&dir.path().join("vanished"), &dst, DetectionMode::Fast);
        assert!(verdict.should_copy);
        assert_eq!(verdict.reason, VerdictReason::MetadataUnreadable);
    }

    #[test]
    fn test_hash_detects_single_byte_change_with_equal_metadata() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        write_with_mtime(&src, b"content-A", 1_700_000_000, 0);
        write_with_mtime(&dst, b"content-B", 1_700_000_000, 0);

        assert!(!decide(&src, &dst, DetectionMode::Fast).should_copy);

        let verdict = decide(&src, &dst, DetectionMode::Hash);
        assert!(verdict.should_copy);
        assert_eq!(verdict.reason, VerdictReason::ContentDiffers);
    }

    #[test]
    fn test_hash_identical_carries_digest() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        write_with_mtime(&src, b"abc", 1_000, 0);
        write_with_mtime(&dst, b"abc", 2_000, 0);

        let verdict = decide(&src, &dst, DetectionMode::Hash);
        assert!(!verdict.should_copy);
        assert_eq!(verdict.reason, VerdictReason::IdenticalHash);
        assert_eq!(
            verdict.source_digest.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn test_hash_failure_fails_open() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        fs::write(&src, b"abc").unwrap();
        // A directory exists but cannot be read as a file.
        let dst = dir.path().join("dir-target");
        fs::create_dir(&dst).unwrap();

        let verdict = decide(&src, &dst, DetectionMode::Hash);
        assert!(verdict.should_copy);
        assert_eq!(verdict.reason, VerdictReason::HashFailed);
    }

    #[test]
    fn test_hash_mode_after_stop_never_skips() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        fs::write(&src, b"same").unwrap();
        fs::write(&dst, b"same").unwrap();

        let control = ControlFlags::new();
        control.signal_stop();

        let verdict = decide_until_stopped(&src, &dst, DetectionMode::Hash, &control);
        assert!(verdict.should_copy);
        assert_eq!(verdict.source_digest, None);
    }

    #[test]
    fn test_decide_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        write_with_mtime(&src, b"one", 5_000, 0);
        write_with_mtime(&dst, b"two", 5_000, 0);

        for mode in [DetectionMode::Fast, DetectionMode::Hash] {
            assert_eq!(decide(&src, &dst, mode), decide(&src, &dst, mode));
        }
    }
}
