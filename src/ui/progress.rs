//! Progress reporting

use crate::commands::sync::{RunState, RunSummary, SyncEvent};
use console::style;
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;

/// Terminal renderer for the worker's event stream
pub struct ProgressReporter {
    _multi: MultiProgress,
    overall_bar: ProgressBar,
    file_bar: ProgressBar,
    status: String,
    state: RunState,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Reporter that draws nothing, for tests and non-interactive output.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let overall_bar = multi.add(ProgressBar::new(100));
        let file_bar = multi.add(ProgressBar::new(100));

        if let Ok(style) = ProgressStyle::with_template("{bar:30.cyan/blue} {pos:>3}% files {msg}")
        {
            overall_bar.set_style(style.progress_chars("=>-"));
        }
        if let Ok(style) = ProgressStyle::with_template("{bar:30.green/white} {pos:>3}% {msg}") {
            file_bar.set_style(style.progress_chars("=>-"));
        }

        Self {
            _multi: multi,
            overall_bar,
            file_bar,
            status: String::new(),
            state: RunState::Idle,
        }
    }

    /// Apply one worker event to the display.
    pub fn handle(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::StateChanged { state } => self.set_paused(*state == RunState::Paused),
            SyncEvent::OverallProgress { percent, position } => {
                self.overall_bar.set_position(u64::from(*percent));
                self.overall_bar.set_message(position.clone());
            }
            SyncEvent::FileStatus { status, source } => {
                self.set_current_file(status, source);
            }
            SyncEvent::FileProgress {
                percent,
                file_name,
                reason,
                bytes_per_second,
            } => {
                self.file_bar.set_position(u64::from(*percent));
                self.file_bar
                    .set_message(format_file_line(file_name, reason, *bytes_per_second));
            }
            SyncEvent::RunComplete { summary } => {
                self.state = summary.state;
                self.finish(summary);
            }
        }
    }

    /// Reflect a pause seen either in the flags or in a state event.
    pub fn set_paused(&mut self, paused: bool) {
        self.state = if paused {
            RunState::Paused
        } else {
            RunState::Running
        };
        if paused {
            self.file_bar.set_message(format!("{} (paused)", self.status));
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state == RunState::Paused
    }

    /// Update current file indicator.
    pub fn set_current_file(&mut self, status: &str, path: &Path) {
        self.status = status.to_string();
        self.overall_bar
            .println(format!("{} {}", style("→").dim(), path.display()));
    }

    /// Finalize both bars and print the summary.
    pub fn finish(&self, summary: &RunSummary) {
        self.file_bar.finish_and_clear();
        self.overall_bar.finish_and_clear();

        let headline = match summary.state {
            RunState::Stopped => style("Stopped").yellow().bold(),
            _ if summary.counters.failed > 0 => style("Finished with failures").red().bold(),
            _ => style("Done").green().bold(),
        };
        println!("{}", headline);
        println!("{}", summary);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_file_line(file_name: &str, reason: &str, bytes_per_second: u64) -> String {
    if bytes_per_second > 0 {
        format!(
            "{} [{}] {}/s",
            file_name,
            reason,
            HumanBytes(bytes_per_second)
        )
    } else {
        format!("{} [{}]", file_name, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::sync::RunCounters;
    use std::path::PathBuf;

    #[test]
    fn test_file_line_includes_speed_when_known() {
        let line = format_file_line("big.bin", "new file", 2 * 1024 * 1024);
        assert!(line.contains("big.bin"));
        assert!(line.contains("new file"));
        assert!(line.contains("MiB/s"));

        assert_eq!(format_file_line("a", "done", 0), "a [done]");
    }

    #[test]
    fn test_handle_updates_bar_positions() {
        let mut reporter = ProgressReporter::hidden();

        reporter.handle(&SyncEvent::OverallProgress {
            percent: 50,
            position: "1/2".to_string(),
        });
        reporter.handle(&SyncEvent::FileProgress {
            percent: 75,
            file_name: "a.txt".to_string(),
            reason: "new file".to_string(),
            bytes_per_second: 1024,
        });

        assert_eq!(reporter.overall_bar.position(), 50);
        assert_eq!(reporter.overall_bar.message(), "1/2");
        assert_eq!(reporter.file_bar.position(), 75);
        assert!(reporter.file_bar.message().contains("KiB/s"));
    }

    #[test]
    fn test_status_and_pause_are_tracked() {
        let mut reporter = ProgressReporter::hidden();
        reporter.handle(&SyncEvent::FileStatus {
            status: "Processing: a.txt".to_string(),
            source: PathBuf::from("/src/a.txt"),
        });
        reporter.set_paused(true);

        assert!(reporter.is_paused());
        assert!(reporter.file_bar.message().contains("Processing: a.txt"));
        assert!(reporter.file_bar.message().contains("paused"));
    }

    #[test]
    fn test_state_events_drive_pause_display() {
        let mut reporter = ProgressReporter::hidden();
        assert_eq!(reporter.state, RunState::Idle);

        reporter.handle(&SyncEvent::StateChanged {
            state: RunState::Running,
        });
        assert!(!reporter.is_paused());

        reporter.handle(&SyncEvent::StateChanged {
            state: RunState::Paused,
        });
        assert!(reporter.is_paused());

        reporter.handle(&SyncEvent::RunComplete {
            summary: RunSummary {
                state: RunState::Stopped,
                counters: RunCounters::default(),
                total_files: 3,
                log_file: PathBuf::from("run.log"),
            },
        });
        assert_eq!(reporter.state, RunState::Stopped);
        assert!(!reporter.is_paused());
    }

    #[test]
    fn test_finish_executes_without_panicking() {
        let reporter = ProgressReporter::hidden();
        reporter.finish(&RunSummary {
            state: RunState::Completed,
            counters: RunCounters {
                copied: 1,
                skipped: 0,
                failed: 0,
            },
            total_files: 1,
            log_file: PathBuf::from("run.log"),
        });
    }
}
