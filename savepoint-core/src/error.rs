//! Error types for the backup pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a whole backup job, or of a trigger-surface call.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Quiesce error: {0}")]
    Quiesce(#[from] HostError),

    #[error("Could not create backup directory {}: {source}", path.display())]
    BackupDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("A backup is already in progress")]
    AlreadyRunning,

    #[error("Backup worker exited without reporting an outcome")]
    WorkerLost,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by the host while toggling auto-save or flushing state.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Host command `{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Host rejected the request: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Unsupported source (not a file or directory): {}", .0.display())]
    UnsupportedSource(PathBuf),
}

/// A single failure during retention. Never aborts the job.
#[derive(Error, Debug)]
pub enum PruneError {
    #[error("Failed to list {}: {source}", dir.display())]
    List {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
