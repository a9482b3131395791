//! Append-only, human-readable audit log
//!
//! Every line is `[YYYY-MM-DD HH:MM:SS] message`, appended to a plain text
//! file and mirrored to `tracing` under the `audit` target. Write failures are
//! reported through `tracing` and otherwise ignored; an audit problem must
//! never interrupt a transfer.

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

pub const RUN_SEPARATOR: &str = "==================================================";

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one timestamped line.
    pub fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(target: "audit", "{}", message);

        let line = format_line(&Local::now().format("%Y-%m-%d %H:%M:%S").to_string(), message);
        if let Err(e) = self.append(&line) {
            warn!(path = %self.path.display(), error = %e, "failed to write audit log");
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

fn format_line(timestamp: &str, message: &str) -> String {
    format!("[{}] {}", timestamp, message)
}
