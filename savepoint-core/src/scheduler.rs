//! Tick-driven backup scheduler with a single-flight guard.
//!
//! The [`Scheduler`] is owned by the tick loop. Other tasks talk to it through
//! a cloneable [`SchedulerHandle`], which can only raise the `requested` flag
//! or read state. Starting a job and observing its completion both happen
//! inside [`Scheduler::tick`], so at most one job is ever in flight.

use crate::config::{BackupConfig, ConfigStore};
use crate::error::{BackupError, ConfigError};
use crate::runner::{JobOutcome, JobReport, JobRunner};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug)]
struct SchedulerState {
    in_progress: bool,
    requested: bool,
    last_completion: DateTime<Utc>,
}

/// Point-in-time view of the scheduler, for status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub requested: bool,
    pub last_completion: DateTime<Utc>,
    pub automatic_backups: bool,
    pub next_due: DateTime<Utc>,
}

/// Trigger surface shared with request handlers
#[derive(Clone)]
pub struct SchedulerHandle {
    state: Arc<Mutex<SchedulerState>>,
    config: Arc<ConfigStore>,
}

fn lock(state: &Mutex<SchedulerState>) -> MutexGuard<'_, SchedulerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SchedulerHandle {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        lock(&self.state)
    }

    /// Ask for a backup on the next tick. Repeated requests collapse into one.
    pub fn request_backup(&self) {
        self.lock().requested = true;
    }

    /// Like [`request_backup`](Self::request_backup), but refuses while a job
    /// is already running
    pub fn start_backup(&self) -> Result<(), BackupError> {
        let mut state = self.lock();
        if state.in_progress {
            return Err(BackupError::AlreadyRunning);
        }
        state.requested = true;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock().in_progress
    }

    pub fn status(&self) -> SchedulerStatus {
        let config = self.config.current();
        let state = self.lock();
        SchedulerStatus {
            running: state.in_progress,
            requested: state.requested,
            last_completion: state.last_completion,
            automatic_backups: config.automatic_backups,
            next_due: state
                .last_completion
                .checked_add_signed(config.interval())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn config(&self) -> Arc<BackupConfig> {
        self.config.current()
    }

    /// Replace the active configuration; takes effect on the next tick
    pub fn reload_config(&self) -> Result<Arc<BackupConfig>, ConfigError> {
        self.config.reload()
    }
}

struct InFlight {
    job_id: Uuid,
    completion: oneshot::Receiver<JobReport>,
}

pub struct Scheduler {
    handle: SchedulerHandle,
    runner: Arc<JobRunner>,
    in_flight: Option<InFlight>,
}

impl Scheduler {
    /// `now` is taken as the last completion time, so the first automatic
    /// backup is due one interval after start-up.
    pub fn new(config: Arc<ConfigStore>, runner: JobRunner, now: DateTime<Utc>) -> Self {
        Self {
            handle: SchedulerHandle {
                state: Arc::new(Mutex::new(SchedulerState {
                    in_progress: false,
                    requested: false,
                    last_completion: now,
                })),
                config,
            },
            runner: Arc::new(runner),
            in_flight: None,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Called once per heartbeat. Returns the id of a job started by this tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Uuid> {
        if let Some(report) = self.poll_completion() {
            self.record(&report);
        }

        let config = self.handle.config.current();
        if !config.automatic_backups {
            return None;
        }

        let shared = self.handle.state.clone();
        let mut state = lock(&shared);
        if now - state.last_completion > config.interval() {
            state.requested = true;
        }

        // A running job absorbs any pending request
        if state.in_progress {
            state.requested = false;
        }

        if !state.requested {
            return None;
        }
        Some(self.start_job(&mut state, config))
    }

    /// Wait for the in-flight job, if any, and record its completion
    pub async fn join_current(&mut self) -> Option<JobReport> {
        let InFlight { job_id, completion } = self.in_flight.take()?;
        let report = completion.await.unwrap_or_else(|_| lost_report(job_id));
        self.record(&report);
        Some(report)
    }

    fn start_job(&mut self, state: &mut SchedulerState, config: Arc<BackupConfig>) -> Uuid {
        assert!(
            !state.in_progress,
            "backup job started while another job is in progress"
        );
        state.in_progress = true;
        state.requested = false;

        let job_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let runner = self.runner.clone();

        tokio::task::spawn_blocking(move || {
            let report = runner.run(job_id, &config);
            if tx.send(report).is_err() {
                warn!(job_id = %job_id, "Scheduler dropped before job completion");
            }
        });

        self.in_flight = Some(InFlight {
            job_id,
            completion: rx,
        });
        info!(job_id = %job_id, "Backup job started");
        job_id
    }

    fn poll_completion(&mut self) -> Option<JobReport> {
        let in_flight = self.in_flight.as_mut()?;
        let report = match in_flight.completion.try_recv() {
            Ok(report) => report,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => lost_report(in_flight.job_id),
        };
        self.in_flight = None;
        Some(report)
    }

    fn record(&self, report: &JobReport) {
        let mut state = self.handle.lock();
        state.in_progress = false;
        state.last_completion = report.finished_at;

        match &report.outcome {
            JobOutcome::Success(archive) => info!(
                job_id = %report.job_id,
                path = %archive.path.display(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Backup job finished"
            ),
            JobOutcome::Failure(e) => error!(
                job_id = %report.job_id,
                error = %e,
                "Backup job failed, retrying after the next interval"
            ),
        }
    }
}

fn lost_report(job_id: Uuid) -> JobReport {
    JobReport {
        job_id,
        outcome: JobOutcome::Failure(BackupError::WorkerLost),
        finished_at: Utc::now(),
        elapsed: Duration::ZERO,
    }
}
