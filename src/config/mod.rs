//! Configuration management
//!
//! Run settings come from three layers, highest priority first: command-line
//! flags, the TOML config file, and built-in defaults. The merged [`Config`]
//! is an explicit value handed to the orchestrator; nothing is global.

use crate::executor::{DEFAULT_CHUNK_SIZE, DEFAULT_POLL_INTERVAL};
use crate::types::{DetectionMode, SyncError};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "chunksync.toml";
pub const DEFAULT_LOG_FILE: &str = "chunksync.log";
pub const DEFAULT_HASH_DB_FILE: &str = "chunksync-hashes.json";

const MIB: usize = 1024 * 1024;

/// Incremental directory sync with resumable chunked copies
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "chunksync", version, about)]
pub struct Cli {
    /// Source directory (defaults to `source_dir` from the config file)
    #[arg(value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// Target directory, created if missing (defaults to `target_dir`)
    #[arg(value_name = "TARGET")]
    pub destination: Option<PathBuf>,

    /// Change detection: `fast` (size + mtime) or `hash` (SHA-256)
    #[arg(short, long, value_enum)]
    pub mode: Option<DetectionMode>,

    /// Delete each source file after it has been copied successfully
    #[arg(long, overrides_with = "no_delete_source")]
    pub delete_source: bool,

    /// Keep source files even if the config file sets `delete_after_copy`
    #[arg(long, overrides_with = "delete_source")]
    pub no_delete_source: bool,

    /// Config file to read (and write with --save-config)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Audit log location
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Hash cache location
    #[arg(long, value_name = "FILE")]
    pub hash_db: Option<PathBuf>,

    /// Copy chunk size in MiB
    #[arg(long, value_name = "MIB")]
    pub chunk_size_mib: Option<usize>,

    /// Persist the effective settings to the config file before running
    #[arg(long)]
    pub save_config: bool,

    /// Increase diagnostic output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }
}

/// On-disk settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub source_dir: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    pub detection_mode: DetectionMode,
    pub delete_after_copy: bool,
    pub log_file: Option<PathBuf>,
    pub hash_db_file: Option<PathBuf>,
    pub chunk_size_mib: Option<usize>,
}

impl ConfigFile {
    /// Read `path`; a missing or malformed file yields defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file unreadable; using defaults");
                return Self::default();
            }
        };

        match toml::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file is malformed; using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, raw)?;
        Ok(())
    }
}

/// Settings for one run
#[derive(Debug, Clone)]
pub struct Config {
    /// Source directory
    pub source: PathBuf,

    /// Target directory
    pub destination: PathBuf,

    /// Copy/skip strategy for the whole run
    pub detection_mode: DetectionMode,

    /// Remove each source file after a successful copy
    pub delete_source_after_copy: bool,

    /// Audit log file
    pub log_file: PathBuf,

    /// Hash cache file
    pub hash_db_file: PathBuf,

    /// Bytes per copy chunk
    pub chunk_size: usize,

    /// Flag polling interval while paused
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            destination: PathBuf::new(),
            detection_mode: DetectionMode::Fast,
            delete_source_after_copy: false,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            hash_db_file: PathBuf::from(DEFAULT_HASH_DB_FILE),
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Config {
    /// Merge CLI flags over a config file. Does not validate.
    pub fn merge(cli: &Cli, file: &ConfigFile) -> Result<Self, SyncError> {
        let defaults = Config::default();

        let source = cli
            .source
            .clone()
            .or_else(|| file.source_dir.clone())
            .ok_or_else(|| {
                SyncError::Config("No source directory given (argument or source_dir)".to_string())
            })?;
        let destination = cli
            .destination
            .clone()
            .or_else(|| file.target_dir.clone())
            .ok_or_else(|| {
                SyncError::Config("No target directory given (argument or target_dir)".to_string())
            })?;

        let chunk_size = match cli.chunk_size_mib.or(file.chunk_size_mib) {
            Some(mib) => mib.checked_mul(MIB).ok_or_else(|| {
                SyncError::Config(format!("Chunk size of {} MiB is too large", mib))
            })?,
            None => defaults.chunk_size,
        };

        Ok(Self {
            source,
            destination,
            detection_mode: cli.mode.unwrap_or(file.detection_mode),
            delete_source_after_copy: if cli.delete_source {
                true
            } else if cli.no_delete_source {
                false
            } else {
                file.delete_after_copy
            },
            log_file: cli
                .log_file
                .clone()
                .or_else(|| file.log_file.clone())
                .unwrap_or(defaults.log_file),
            hash_db_file: cli
                .hash_db
                .clone()
                .or_else(|| file.hash_db_file.clone())
                .unwrap_or(defaults.hash_db_file),
            chunk_size,
            poll_interval: defaults.poll_interval,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), SyncError> {
        if !self.source.is_dir() {
            return Err(SyncError::Validation(format!(
                "Source directory does not exist: {:?}",
                self.source
            )));
        }

        let source = fs::canonicalize(&self.source)?;
        let destination = resolve_target(&self.destination).map_err(|e| {
            SyncError::Validation(format!(
                "Cannot resolve target directory {:?}: {}",
                self.destination, e
            ))
        })?;

        if source == destination {
            return Err(SyncError::Validation(
                "Source and target cannot be the same".to_string(),
            ));
        }

        if destination.starts_with(&source) {
            return Err(SyncError::Validation(
                "Target cannot be inside the source directory".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(SyncError::Validation(
                "Chunk size must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings in config-file form, for `--save-config`.
    pub fn to_file(&self) -> ConfigFile {
        ConfigFile {
            source_dir: Some(self.source.clone()),
            target_dir: Some(self.destination.clone()),
            detection_mode: self.detection_mode,
            delete_after_copy: self.delete_source_after_copy,
            log_file: Some(self.log_file.clone()),
            hash_db_file: Some(self.hash_db_file.clone()),
            chunk_size_mib: Some((self.chunk_size / MIB).max(1)),
        }
    }
}

/// Absolute, symlink-free form of a target that may not exist yet: the
/// deepest existing ancestor is canonicalized and the missing tail re-appended.
fn resolve_target(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = fs::canonicalize(existing)?;
    for name in missing.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

impl TryFrom<&Cli> for Config {
    type Error = SyncError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        let file = ConfigFile::load(&cli.config_path());
        let config = Config::merge(cli, &file)?;
        config.validate()?;
        Ok(config)
    }
}
