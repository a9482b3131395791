//! Main sync command
//!
//! Drives one run on a single worker: walk the source, decide per file, copy
//! what changed, keep counters, and report through [`SyncEvent`]s. The
//! controller only talks back through [`ControlFlags`].
//!
//! ```text
//! Idle ──start──▶ Running ──list exhausted──▶ Completed
//!                  │   ▲
//!            pause │   │ resume
//!                  ▼   │
//!                 Paused ──stop──▶ Stopped ◀──stop── Running
//! ```

use crate::audit::{AuditLog, RUN_SEPARATOR};
use crate::diff::decide_until_stopped;
use crate::executor::{ChunkedCopier, ControlFlags, CopyOutcome};
use crate::hash::{compute_hash_until_stopped, HashStore};
use crate::scanner::list_files;
use crate::types::{DetectionMode, FileTask, SyncError};
use crate::Config;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fmt;
use std::fs;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Capacity of the worker → controller event channel.
pub const EVENT_CAPACITY: usize = 1024;

/// Notifications sent from the worker to whoever drives the run.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The run moved to `Running` or `Paused`. Terminal states arrive in
    /// [`SyncEvent::RunComplete`].
    StateChanged { state: RunState },

    /// Share of files processed so far, plus `"index/total"`
    OverallProgress { percent: u8, position: String },

    /// Human status line for the file being processed
    FileStatus { status: String, source: PathBuf },

    /// Progress of the current file. The terminal one ("done", "skipped: ..",
    /// "failed: ..", "cancelled") is always the last event for that file.
    FileProgress {
        percent: u8,
        file_name: String,
        reason: String,
        bytes_per_second: u64,
    },

    /// Sent exactly once, as the final event of every run.
    RunComplete { summary: RunSummary },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunCounters {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub state: RunState,
    pub counters: RunCounters,
    pub total_files: usize,
    pub log_file: PathBuf,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let RunCounters {
            copied,
            skipped,
            failed,
        } = self.counters;

        match self.state {
            RunState::Completed if self.total_files == 0 => {
                write!(f, "No files found in source directory")
            }
            RunState::Stopped => write!(
                f,
                "Stopped. Copied: {}, skipped: {}, failed: {}\n\nLog file: {}",
                copied,
                skipped,
                failed,
                self.log_file.display()
            ),
            _ => write!(
                f,
                "Copy complete!\n\nCopied: {} file(s)\nSkipped: {} file(s)\nFailed: {} file(s)\n\nLog file: {}",
                copied,
                skipped,
                failed,
                self.log_file.display()
            ),
        }
    }
}

/// One sync run. Consumed by [`SyncRun::run`]; a new run needs a new value.
///
/// Until `run` is called the run is `Idle`. State changes after that are
/// reported as [`SyncEvent::StateChanged`] and [`SyncEvent::RunComplete`].
pub struct SyncRun {
    config: Config,
    control: Arc<ControlFlags>,
    events: Sender<SyncEvent>,
    copier: ChunkedCopier,
    hash_store: HashStore,
    audit: AuditLog,
    counters: RunCounters,
}

impl SyncRun {
    /// Prepare a run. Loads the hash store once, here.
    ///
    /// Clears pause and stop left over from an earlier run. A stop raised
    /// after this returns is honored by `run`.
    pub fn new(config: Config, control: Arc<ControlFlags>, events: Sender<SyncEvent>) -> Self {
        control.reset();
        control.set_delete_source_after_copy(config.delete_source_after_copy);

        Self {
            copier: ChunkedCopier::from_config(&config),
            hash_store: HashStore::load(&config.hash_db_file),
            audit: AuditLog::new(&config.log_file),
            config,
            control,
            events,
            counters: RunCounters::default(),
        }
    }

    /// Execute the run to completion or stop. Always ends with `RunComplete`.
    pub fn run(mut self) -> RunSummary {
        self.start();

        let tasks = list_files(&self.config.source, &self.config.destination);
        let total = tasks.len();

        if total == 0 {
            self.audit.record("No files found in source directory");
            return self.finish(RunState::Completed, total);
        }
        self.audit.record(format!("Found {} files", total));

        for (idx, task) in tasks.iter().enumerate() {
            if self.control.is_stop_requested() || self.wait_if_paused() {
                return self.stop(total);
            }

            if self.process(task, idx + 1, total).is_break() {
                return self.stop(total);
            }
        }

        self.finish(RunState::Completed, total)
    }

    fn start(&mut self) {
        self.counters = RunCounters::default();
        self.emit(SyncEvent::StateChanged {
            state: RunState::Running,
        });

        info!(
            source = %self.config.source.display(),
            target_path = %self.config.destination.display(),
            mode = %self.config.detection_mode,
            "starting sync run"
        );
        self.audit.record(RUN_SEPARATOR);
        self.audit.record("Starting incremental copy");
        self.audit
            .record(format!("Source: {}", self.config.source.display()));
        self.audit
            .record(format!("Target: {}", self.config.destination.display()));
        self.audit
            .record(format!("Detection mode: {}", self.config.detection_mode));

        if let Err(e) = fs::create_dir_all(&self.config.destination) {
            warn!(
                target_path = %self.config.destination.display(),
                error = %e,
                "could not create target root"
            );
        }
    }

    /// Block between files while paused. Returns true if stop was raised.
    fn wait_if_paused(&mut self) -> bool {
        if !self.control.is_paused() {
            return false;
        }
        self.emit(SyncEvent::StateChanged {
            state: RunState::Paused,
        });
        let stopped = self.control.wait_while_paused(self.config.poll_interval);
        if !stopped {
            self.emit(SyncEvent::StateChanged {
                state: RunState::Running,
            });
        }
        stopped
    }

    fn process(&mut self, task: &FileTask, index: usize, total: usize) -> ControlFlow<()> {
        let file_name = task.file_name();
        let rel = task.relative_path.display().to_string();

        self.emit(SyncEvent::FileStatus {
            status: format!("Processing: {}", file_name),
            source: task.source_path.clone(),
        });
        self.emit(SyncEvent::OverallProgress {
            percent: (index * 100 / total) as u8,
            position: format!("{}/{}", index, total),
        });

        let verdict = decide_until_stopped(
            &task.source_path,
            &task.target_path,
            self.config.detection_mode,
            &self.control,
        );
        if self.control.is_stop_requested() {
            // Verdict may rest on an abandoned hash; leave the file for the next run.
            return ControlFlow::Break(());
        }
        let reason = verdict.reason.to_string();
        self.emit_file_progress(0, &file_name, &reason, 0);

        if !verdict.should_copy {
            self.counters.skipped += 1;
            if let Some(digest) = verdict.source_digest {
                self.hash_store.record(&task.target_path, digest);
            }
            self.audit.record(format!("SKIP {} ({})", rel, reason));
            self.emit_file_progress(100, &file_name, &format!("skipped: {}", reason), 0);
            return ControlFlow::Continue(());
        }

        let outcome = {
            let events = self.events.clone();
            let (name, why) = (file_name.clone(), reason.clone());
            self.copier.copy(
                &task.source_path,
                &task.target_path,
                &self.control,
                move |percent, bytes_per_second| {
                    let _ = events.send(SyncEvent::FileProgress {
                        percent,
                        file_name: name.clone(),
                        reason: why.clone(),
                        bytes_per_second,
                    });
                },
            )
        };

        match outcome {
            CopyOutcome::Success { resumed_from, .. } => {
                self.counters.copied += 1;
                if resumed_from > 0 {
                    self.audit.record(format!(
                        "COPY {} ({}, resumed at {} bytes)",
                        rel, reason, resumed_from
                    ));
                } else {
                    self.audit.record(format!("COPY {} ({})", rel, reason));
                }
                self.after_copy(task);
                self.emit_file_progress(100, &file_name, "done", 0);
            }
            CopyOutcome::Cancelled {
                message,
                cleanup_failed,
            } => {
                self.on_cancelled(&rel, &file_name, &message, cleanup_failed);
                if self.control.is_stop_requested() || self.wait_if_paused() {
                    return ControlFlow::Break(());
                }
            }
            CopyOutcome::Failed(err) => {
                self.counters.failed += 1;
                self.audit.record(format!("FAIL {} - {}", rel, err));
                self.emit_file_progress(0, &file_name, &format!("failed: {}", err.humanize()), 0);
            }
        }

        ControlFlow::Continue(())
    }

    /// A cancelled file is not counted: it is simply unresolved this pass.
    fn on_cancelled(&self, rel: &str, file_name: &str, message: &str, cleanup_failed: bool) {
        self.audit.record(format!("CANCEL {} - {}", rel, message));
        let status = if cleanup_failed {
            "cancelled (cleanup failed)"
        } else {
            "cancelled"
        };
        self.emit_file_progress(0, file_name, status, 0);
    }

    /// Post-copy bookkeeping: hash record and optional source removal.
    fn after_copy(&mut self, task: &FileTask) {
        if self.config.detection_mode == DetectionMode::Hash {
            match compute_hash_until_stopped(&task.target_path, &self.control) {
                Ok(digest) => self.hash_store.record(&task.target_path, digest),
                Err(e @ SyncError::Interrupted { .. }) => {
                    debug!(error = %e, "skipping hash record after stop")
                }
                Err(e) => warn!(error = %e, "could not hash copied target"),
            }
        }

        if self.control.delete_source_after_copy() {
            match fs::remove_file(&task.source_path) {
                Ok(()) => self.audit.record(format!(
                    "Deleted source file: {}",
                    task.source_path.display()
                )),
                Err(e) => self.audit.record(format!(
                    "Failed to delete source file: {} - {}",
                    task.source_path.display(),
                    e
                )),
            }
        }
    }

    fn stop(self, total: usize) -> RunSummary {
        self.audit.record("User stopped the copy");
        self.finish(RunState::Stopped, total)
    }

    fn finish(mut self, state: RunState, total: usize) -> RunSummary {
        if self.hash_store.is_dirty() {
            if let Err(e) = self.hash_store.save() {
                warn!(error = %e, "failed to persist hash store");
                self.audit.record(format!("Failed to save hash store: {}", e));
            }
        }

        let RunCounters {
            copied,
            skipped,
            failed,
        } = self.counters;
        let label = match state {
            RunState::Stopped => "Copy stopped",
            _ => "Copy finished",
        };
        self.audit.record(RUN_SEPARATOR);
        self.audit.record(format!(
            "{} - copied: {}, skipped: {}, failed: {}",
            label, copied, skipped, failed
        ));
        info!(copied, skipped, failed, ?state, "sync run ended");

        let summary = RunSummary {
            state,
            counters: self.counters,
            total_files: total,
            log_file: self.config.log_file.clone(),
        };
        self.emit(SyncEvent::RunComplete {
            summary: summary.clone(),
        });
        summary
    }

    fn emit_file_progress(&self, percent: u8, file_name: &str, reason: &str, bytes_per_second: u64) {
        self.emit(SyncEvent::FileProgress {
            percent,
            file_name: file_name.to_string(),
            reason: reason.to_string(),
            bytes_per_second,
        });
    }

    /// Fire and forget; a controller that went away is not an error.
    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }
}

/// Start a run on its own worker thread.
///
/// Returns the worker handle and the bounded event receiver the controller
/// should drain on its own tick. The run is prepared (and its flags cleared)
/// before this returns, so a stop raised afterwards always reaches the worker.
pub fn spawn(
    config: Config,
    control: Arc<ControlFlags>,
) -> Result<(JoinHandle<RunSummary>, Receiver<SyncEvent>), SyncError> {
    let (tx, rx) = bounded(EVENT_CAPACITY);
    let run = SyncRun::new(config, control, tx);
    let handle = thread::Builder::new()
        .name("chunksync-worker".to_string())
        .spawn(move || run.run())?;
    Ok((handle, rx))
}
