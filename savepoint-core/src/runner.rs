//! Backup job runner - executes one backup attempt end to end.
//!
//! A job runs on a blocking worker, never on the tick loop:
//! - quiesce the host and flush its state
//! - archive the source directory
//! - prune old archives
//! - resume auto-save (guaranteed once quiesced)
//!
//! Every failure is caught here and turned into [`JobOutcome::Failure`].

use crate::archiver::{ArchiveFile, Archiver};
use crate::config::BackupConfig;
use crate::error::BackupError;
use crate::notice::{Notice, Notifier};
use crate::quiesce::{FlushOptions, Host, QuiesceGuard};
use crate::retention::RetentionPolicy;
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Where a job reads from and writes to
#[derive(Debug, Clone)]
pub struct JobContext {
    pub source_dir: PathBuf,
    pub backup_dir: PathBuf,
}

#[derive(Debug)]
pub enum JobOutcome {
    Success(ArchiveFile),
    Failure(BackupError),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }
}

/// Terminal result of one job, delivered exactly once
#[derive(Debug)]
pub struct JobReport {
    pub job_id: Uuid,
    pub outcome: JobOutcome,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

pub struct JobRunner {
    context: JobContext,
    host: Arc<dyn Host>,
    archiver: Arc<dyn Archiver>,
    notifier: Arc<dyn Notifier>,
}

impl JobRunner {
    pub fn new(
        context: JobContext,
        host: Arc<dyn Host>,
        archiver: Arc<dyn Archiver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            context,
            host,
            archiver,
            notifier,
        }
    }

    pub fn context(&self) -> &JobContext {
        &self.context
    }

    /// Run one job to completion. Blocks for the whole archive pass.
    pub fn run(&self, job_id: Uuid, config: &BackupConfig) -> JobReport {
        let start_time = Instant::now();

        info!(
            job_id = %job_id,
            source = %self.context.source_dir.display(),
            "Starting backup"
        );
        self.notifier.notify(Notice::Started { job_id });

        let outcome = match self.execute(config) {
            Ok(archive) => {
                let elapsed_secs = start_time.elapsed().as_secs();
                info!(
                    job_id = %job_id,
                    path = %archive.path.display(),
                    elapsed_secs,
                    "Backup completed"
                );
                self.notifier.notify(Notice::Finished { job_id, elapsed_secs });
                JobOutcome::Success(archive)
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Backup failed");
                self.notifier.notify(Notice::Failed {
                    job_id,
                    error: e.to_string(),
                });
                JobOutcome::Failure(e)
            }
        };

        JobReport {
            job_id,
            outcome,
            finished_at: Utc::now(),
            elapsed: start_time.elapsed(),
        }
    }

    fn execute(&self, config: &BackupConfig) -> Result<ArchiveFile, BackupError> {
        let quiesce = QuiesceGuard::acquire(self.host.as_ref(), self.notifier.as_ref())?;
        quiesce.flush_all(FlushOptions::FULL)?;

        self.notifier.notify(Notice::Compressing);
        let backup_dir = &self.context.backup_dir;
        std::fs::create_dir_all(backup_dir).map_err(|source| BackupError::BackupDir {
            path: backup_dir.clone(),
            source,
        })?;

        let archive = ArchiveFile::for_source(backup_dir, &self.context.source_dir, Local::now());
        self.archiver.compress(&self.context.source_dir, &archive.path)?;
        self.notifier.notify(Notice::ArchiveWritten {
            path: archive.path.clone(),
        });

        let policy = RetentionPolicy::new(config.backups_to_keep);
        let prune_errors = policy.prune_with(backup_dir, |path| {
            self.notifier.notify(Notice::DeletingOldBackup {
                path: path.to_path_buf(),
            });
        });
        for e in prune_errors {
            warn!(error = %e, "Retention step failed");
            self.notifier.notify(Notice::PruneFailed {
                error: e.to_string(),
            });
        }

        drop(quiesce);
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::ZipArchiver;
    use crate::testing::{FakeArchiver, Recorder, RecordingHost};
    use std::fs;
    use tempfile::TempDir;

    fn runner(
        temp_dir: &TempDir,
        host: RecordingHost,
        archiver: impl Archiver + 'static,
        recorder: &Recorder,
    ) -> JobRunner {
        let source_dir = temp_dir.path().join("world");
        fs::create_dir_all(&source_dir).unwrap();
        fs::write(source_dir.join("level.dat"), b"level").unwrap();
        JobRunner::new(
            JobContext {
                source_dir,
                backup_dir: temp_dir.path().join("backup"),
            },
            Arc::new(host),
            Arc::new(archiver),
            Arc::new(recorder.clone()),
        )
    }

    #[test]
    fn test_successful_job_order() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let runner = runner(
            &temp_dir,
            RecordingHost::new(recorder.clone()),
            FakeArchiver::new(recorder.clone()),
            &recorder,
        );

        let job_id = Uuid::new_v4();
        let report = runner.run(job_id, &BackupConfig::default());

        assert_eq!(report.job_id, job_id);
        assert!(report.outcome.is_success());
        assert_eq!(recorder.timeline(), vec!["disable", "flush", "compress", "enable"]);

        let notices = recorder.notices();
        assert_eq!(notices.first(), Some(&Notice::Started { job_id }));
        assert!(matches!(notices.last(), Some(Notice::Finished { .. })));
        let enabled = notices.iter().position(|n| *n == Notice::AutoSaveEnabled).unwrap();
        assert_eq!(enabled, notices.len() - 2);
    }

    #[test]
    fn test_archive_failure_resumes_exactly_once() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let runner = runner(
            &temp_dir,
            RecordingHost::new(recorder.clone()),
            FakeArchiver::failing(recorder.clone()),
            &recorder,
        );

        let report = runner.run(Uuid::new_v4(), &BackupConfig::default());

        assert!(matches!(
            report.outcome,
            JobOutcome::Failure(BackupError::Archive(_))
        ));
        assert_eq!(recorder.timeline(), vec!["disable", "flush", "compress", "enable"]);
        assert_eq!(
            recorder.host_calls().iter().filter(|c| **c == "enable").count(),
            1
        );
        assert!(matches!(recorder.notices().last(), Some(Notice::Failed { .. })));
    }

    #[test]
    fn test_flush_failure_skips_archive() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let runner = runner(
            &temp_dir,
            RecordingHost::new(recorder.clone()).failing_flush(),
            FakeArchiver::new(recorder.clone()),
            &recorder,
        );

        let report = runner.run(Uuid::new_v4(), &BackupConfig::default());

        assert!(matches!(
            report.outcome,
            JobOutcome::Failure(BackupError::Quiesce(_))
        ));
        assert_eq!(recorder.timeline(), vec!["disable", "flush", "enable"]);
    }

    #[test]
    fn test_backup_dir_creation_failure() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let mut runner = runner(
            &temp_dir,
            RecordingHost::new(recorder.clone()),
            FakeArchiver::new(recorder.clone()),
            &recorder,
        );
        // A regular file where the backup directory should be
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        runner.context.backup_dir = blocker.join("backup");

        let report = runner.run(Uuid::new_v4(), &BackupConfig::default());

        assert!(matches!(
            report.outcome,
            JobOutcome::Failure(BackupError::BackupDir { .. })
        ));
        assert_eq!(recorder.timeline(), vec!["disable", "flush", "enable"]);
    }

    #[test]
    fn test_retention_runs_after_archive() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let runner = runner(
            &temp_dir,
            RecordingHost::new(recorder.clone()),
            ZipArchiver::default(),
            &recorder,
        );

        let backup_dir = temp_dir.path().join("backup");
        fs::create_dir_all(&backup_dir).unwrap();
        let old = backup_dir.join("world_20000101_000000.zip");
        fs::write(&old, b"stale").unwrap();
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(946_684_800))
            .unwrap();

        let config = BackupConfig {
            backups_to_keep: 1,
            ..BackupConfig::default()
        };
        let report = runner.run(Uuid::new_v4(), &config);

        let JobOutcome::Success(archive) = report.outcome else {
            panic!("expected success");
        };
        assert!(archive.path.exists());
        assert!(!old.exists());
        assert!(recorder
            .notices()
            .contains(&Notice::DeletingOldBackup { path: old }));
    }
}
