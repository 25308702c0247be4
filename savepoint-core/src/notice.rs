//! Progress notices emitted by a backup job.
//!
//! Notices are fire-and-forget: a [`Notifier`] cannot fail the job, and a
//! notifier with nobody listening simply drops them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Who a notice is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Everyone,
    Operators,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Notice {
    #[serde(rename = "backup:started")]
    Started { job_id: Uuid },

    #[serde(rename = "autosave:disabled")]
    AutoSaveDisabled,

    #[serde(rename = "save:started")]
    SavingGame,

    #[serde(rename = "save:completed")]
    SavedGame,

    #[serde(rename = "archive:compressing")]
    Compressing,

    #[serde(rename = "archive:written")]
    ArchiveWritten { path: PathBuf },

    #[serde(rename = "retention:deleting")]
    DeletingOldBackup { path: PathBuf },

    #[serde(rename = "retention:failed")]
    PruneFailed { error: String },

    #[serde(rename = "autosave:enabled")]
    AutoSaveEnabled,

    #[serde(rename = "backup:completed")]
    Finished { job_id: Uuid, elapsed_secs: u64 },

    #[serde(rename = "backup:failed")]
    Failed { job_id: Uuid, error: String },
}

impl Notice {
    pub fn audience(&self) -> Audience {
        match self {
            Notice::Started { .. } | Notice::Finished { .. } | Notice::Failed { .. } => {
                Audience::Everyone
            }
            _ => Audience::Operators,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Started { .. } => write!(f, "Beginning backup, watch out for lag!"),
            Notice::AutoSaveDisabled => write!(f, "Automatic saving is now disabled"),
            Notice::SavingGame => write!(f, "Saving the game (this may take a moment!)"),
            Notice::SavedGame => write!(f, "Saved the game"),
            Notice::Compressing => write!(f, "Compressing backup"),
            Notice::ArchiveWritten { path } => write!(f, "Done: {}", path.display()),
            Notice::DeletingOldBackup { path } => {
                write!(f, "Deleting old backup: {}", path.display())
            }
            Notice::PruneFailed { error } => write!(f, "Could not delete old backup: {}", error),
            Notice::AutoSaveEnabled => write!(f, "Automatic saving is now enabled"),
            Notice::Finished { elapsed_secs, .. } => {
                write!(f, "Backup finished in {} seconds", elapsed_secs)
            }
            Notice::Failed { error, .. } => write!(f, "Backup failed: {}", error),
        }
    }
}

/// Sink for job notices
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
