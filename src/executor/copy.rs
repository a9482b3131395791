//! Resumable, cancellable chunked file copy

use crate::executor::control::ControlFlags;
use crate::types::SyncError;
use crate::Config;
use filetime::FileTime;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Bytes moved per read/write round trip. Large enough to amortize per-call
/// overhead on network-attached targets.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// How often a paused copy re-checks its flags.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bytes compared just before the resume offset to recognize a genuine partial.
const RESUME_CHECK_WINDOW: u64 = 64 * 1024;

/// Result of one [`ChunkedCopier::copy`] call.
#[derive(Debug)]
pub enum CopyOutcome {
    /// Target now holds the full source content
    Success { bytes_written: u64, resumed_from: u64 },

    /// Stop was raised; the partial target was removed unless `cleanup_failed`
    Cancelled { message: String, cleanup_failed: bool },

    /// I/O failure; any partial target is left in place
    Failed(SyncError),
}

impl CopyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CopyOutcome::Success { .. })
    }
}

enum Transfer {
    Complete { bytes_written: u64, resumed_from: u64 },
    Stopped,
}

/// Streams one file at a time from source to target in fixed-size chunks
#[derive(Debug, Clone)]
pub struct ChunkedCopier {
    chunk_size: usize,
    poll_interval: Duration,
}

impl Default for ChunkedCopier {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_POLL_INTERVAL)
    }
}

impl ChunkedCopier {
    pub fn new(chunk_size: usize, poll_interval: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            poll_interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.chunk_size, config.poll_interval)
    }

    /// Copy `src` to `dest`, resuming a partial target when possible
    ///
    /// 1. Create the target's parent directories
    /// 2. Resume from the length of an existing shorter target whose tail
    ///    agrees with the source; otherwise truncate and start at 0
    /// 3. Before each chunk check stop, then pause. Stop deletes the partial
    ///    target. Pause blocks here without emitting progress, and the speed
    ///    baseline restarts on resume.
    /// 4. Each chunk is written and synced before it counts as done
    /// 5. On EOF copy timestamps (best effort) and report `(100, 0)`
    ///
    /// `on_progress(percent, bytes_per_second)` receives percent of the whole
    /// file, including bytes that were already present when resuming.
    pub fn copy<F>(
        &self,
        src: &Path,
        dest: &Path,
        control: &ControlFlags,
        mut on_progress: F,
    ) -> CopyOutcome
    where
        F: FnMut(u8, u64),
    {
        if control.is_stop_requested() {
            return CopyOutcome::Cancelled {
                message: "cancelled by user before transfer started".to_string(),
                cleanup_failed: false,
            };
        }

        match self.transfer(src, dest, control, &mut on_progress) {
            Ok(Transfer::Complete {
                bytes_written,
                resumed_from,
            }) => CopyOutcome::Success {
                bytes_written,
                resumed_from,
            },
            Ok(Transfer::Stopped) => remove_partial(dest),
            Err(e) => {
                warn!(
                    source = %src.display(),
                    target_path = %dest.display(),
                    error = %e,
                    "copy failed; partial target left in place"
                );
                CopyOutcome::Failed(e)
            }
        }
    }

    fn transfer(
        &self,
        src: &Path,
        dest: &Path,
        control: &ControlFlags,
        on_progress: &mut dyn FnMut(u8, u64),
    ) -> Result<Transfer, SyncError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(dest, e))?;
        }

        let source_size = fs::metadata(src).map_err(|e| read_err(src, e))?.len();
        let resumed_from = resume_offset(src, dest, source_size)?;

        let mut src_file = File::open(src).map_err(|e| read_err(src, e))?;
        let mut dest_file = if resumed_from == 0 {
            File::create(dest)
        } else {
            OpenOptions::new().write(true).open(dest)
        }
        .map_err(|e| write_err(dest, e))?;

        if resumed_from > 0 {
            info!(
                target_path = %dest.display(),
                offset = resumed_from,
                "resuming partial target"
            );
            src_file
                .seek(SeekFrom::Start(resumed_from))
                .map_err(|e| read_err(src, e))?;
            dest_file
                .seek(SeekFrom::Start(resumed_from))
                .map_err(|e| write_err(dest, e))?;
        }

        let mut buffer = vec![0u8; self.chunk_size];
        let mut written = resumed_from;
        let mut last_tick = Instant::now();

        loop {
            if control.is_stop_requested() {
                return Ok(Transfer::Stopped);
            }
            if control.is_paused() {
                debug!(target_path = %dest.display(), offset = written, "copy paused");
                if control.wait_while_paused(self.poll_interval) {
                    return Ok(Transfer::Stopped);
                }
                // Paused time is not charged against throughput.
                last_tick = Instant::now();
            }

            let bytes_read = read_chunk(&mut src_file, &mut buffer).map_err(|e| read_err(src, e))?;
            if bytes_read == 0 {
                break; // EOF
            }

            dest_file
                .write_all(&buffer[..bytes_read])
                .map_err(|e| write_err(dest, e))?;
            dest_file.sync_data().map_err(|e| write_err(dest, e))?;
            written += bytes_read as u64;

            let now = Instant::now();
            let elapsed = now.duration_since(last_tick).as_secs_f64();
            let speed = if elapsed > 0.0 {
                (bytes_read as f64 / elapsed) as u64
            } else {
                0
            };
            last_tick = now;

            on_progress(percent_of(written, source_size), speed);
        }

        drop(dest_file);
        drop(src_file);

        copy_timestamps(src, dest);
        on_progress(100, 0);

        Ok(Transfer::Complete {
            bytes_written: written - resumed_from,
            resumed_from,
        })
    }
}

/// Offset to resume from, or 0 to start over.
///
/// Only a target shorter than the source counts as partial. Its last bytes
/// must also match the source at the same range, which catches most targets
/// left behind by a different source version.
fn resume_offset(src: &Path, dest: &Path, source_size: u64) -> Result<u64, SyncError> {
    let existing = match fs::metadata(dest) {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => return Ok(0),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(write_err(dest, e)),
    };

    if existing == 0 {
        return Ok(0);
    }
    if existing >= source_size {
        debug!(
            target_path = %dest.display(),
            existing,
            source_size,
            "existing target is not a partial; restarting from 0"
        );
        return Ok(0);
    }

    match tail_matches(src, dest, existing) {
        Ok(true) => Ok(existing),
        Ok(false) => {
            debug!(target_path = %dest.display(), "stale partial target; restarting from 0");
            Ok(0)
        }
        Err(e) => {
            debug!(target_path = %dest.display(), error = %e, "could not verify partial; restarting from 0");
            Ok(0)
        }
    }
}

fn tail_matches(src: &Path, dest: &Path, offset: u64) -> io::Result<bool> {
    let window = offset.min(RESUME_CHECK_WINDOW);
    let start = offset - window;

    let mut expected = vec![0u8; window as usize];
    let mut actual = vec![0u8; window as usize];

    let mut src_file = File::open(src)?;
    src_file.seek(SeekFrom::Start(start))?;
    src_file.read_exact(&mut expected)?;

    let mut dest_file = File::open(dest)?;
    dest_file.seek(SeekFrom::Start(start))?;
    dest_file.read_exact(&mut actual)?;

    Ok(expected == actual)
}

/// Fill `buf` as far as the file allows; 0 means EOF.
fn read_chunk(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn percent_of(written: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (written.saturating_mul(100) / total).min(100) as u8
}

fn copy_timestamps(src: &Path, dest: &Path) {
    let result = fs::metadata(src).and_then(|meta| {
        filetime::set_file_times(
            dest,
            FileTime::from_last_access_time(&meta),
            FileTime::from_last_modification_time(&meta),
        )
    });
    if let Err(e) = result {
        debug!(target_path = %dest.display(), error = %e, "could not copy timestamps");
    }
}

fn remove_partial(dest: &Path) -> CopyOutcome {
    match fs::remove_file(dest) {
        Ok(()) => {
            info!(target_path = %dest.display(), "removed partial target after stop");
            CopyOutcome::Cancelled {
                message: "cancelled by user; partial target removed".to_string(),
                cleanup_failed: false,
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => CopyOutcome::Cancelled {
            message: "cancelled by user".to_string(),
            cleanup_failed: false,
        },
        Err(e) => {
            warn!(target_path = %dest.display(), error = %e, "failed to remove partial target");
            CopyOutcome::Cancelled {
                message: format!("cancelled by user; failed to remove partial target: {}", e),
                cleanup_failed: true,
            }
        }
    }
}

fn read_err(path: &Path, source: io::Error) -> SyncError {
    SyncError::Read {
        path: path.to_path_buf(),
        source,
    }
}

fn write_err(path: &Path, source: io::Error) -> SyncError {
    SyncError::Write {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 0), 100);
        assert_eq!(percent_of(0, 10), 0);
        assert_eq!(percent_of(5, 10), 50);
        assert_eq!(percent_of(10, 10), 100);
        assert_eq!(percent_of(12, 10), 100);
    }

    #[test]
    fn test_resume_offset_absent_target() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("s");
        fs::write(&src, b"0123456789").unwrap();
        assert_eq!(resume_offset(&src, &dir.path().join("d"), 10).unwrap(), 0);
    }

    #[test]
    fn test_resume_offset_genuine_partial() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("s");
        let dest = dir.path().join("d");
        fs::write(&src, b"0123456789").unwrap();
        fs::write(&dest, b"01234").unwrap();

        assert_eq!(resume_offset(&src, &dest, 10).unwrap(), 5);
    }

    #[test]
    fn test_resume_offset_rejects_longer_or_equal_target() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("s");
        let dest = dir.path().join("d");
        fs::write(&src, b"0123").unwrap();

        fs::write(&dest, b"0123456").unwrap();
        assert_eq!(resume_offset(&src, &dest, 4).unwrap(), 0);

        fs::write(&dest, b"0123").unwrap();
        assert_eq!(resume_offset(&src, &dest, 4).unwrap(), 0);
    }

    #[test]
    fn test_resume_offset_rejects_mismatched_tail() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("s");
        let dest = dir.path().join("d");
        fs::write(&src, b"new-version-content").unwrap();
        fs::write(&dest, b"old-ve").unwrap();

        assert_eq!(resume_offset(&src, &dest, 19).unwrap(), 0);
    }

    #[test]
    fn test_read_chunk_fills_buffer_until_eof() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, vec![1u8; 10]).unwrap();

        let mut file = File::open(&path).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(read_chunk(&mut file, &mut buf).unwrap(), 4);
        assert_eq!(read_chunk(&mut file, &mut buf).unwrap(), 4);
        assert_eq!(read_chunk(&mut file, &mut buf).unwrap(), 2);
        assert_eq!(read_chunk(&mut file, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_remove_partial_reports_cleanup_failure() {
        let dir = TempDir::new().unwrap();
        // remove_file refuses directories, so the cleanup must fail.
        let blocker = dir.path().join("not-a-file");
        fs::create_dir(&blocker).unwrap();

        match remove_partial(&blocker) {
            CopyOutcome::Cancelled {
                message,
                cleanup_failed,
            } => {
                assert!(cleanup_failed);
                assert!(message.contains("failed to remove partial target"), "{}", message);
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert!(blocker.exists());
    }

    #[test]
    fn test_remove_partial_tolerates_missing_target() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            remove_partial(&dir.path().join("never-created")),
            CopyOutcome::Cancelled {
                cleanup_failed: false,
                ..
            }
        ));
    }

    #[test]
    fn test_stop_before_start_leaves_existing_target_untouched() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("s");
        let dest = dir.path().join("d");
        fs::write(&src, b"fresh").unwrap();
        fs::write(&dest, b"previous version").unwrap();

        let control = ControlFlags::new();
        control.signal_stop();

        let outcome = ChunkedCopier::default().copy(&src, &dest, &control, |_, _| {});
        assert!(matches!(outcome, CopyOutcome::Cancelled { cleanup_failed: false, .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"previous version");
    }
}
