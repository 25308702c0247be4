//! Savepoint core library
//!
//! Periodically archives a live, mutable directory tree to timestamped zip
//! snapshots. The owning process is quiesced around the copy, at most one
//! archive job runs at a time, and old snapshots are pruned by count.

pub mod archiver;
pub mod config;
pub mod error;
pub mod notice;
pub mod quiesce;
pub mod retention;
pub mod runner;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{BackupConfig, ConfigStore};
pub use error::BackupError;
pub use scheduler::{Scheduler, SchedulerHandle};
pub type Result<T> = std::result::Result<T, BackupError>;
