//! Drives [`Scheduler::tick`] on a fixed heartbeat.

use chrono::Utc;
use savepoint_core::scheduler::Scheduler;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Tick `scheduler` every `period` until `cancel` fires, then wait for the
/// in-flight job so the archive and the host's auto-save state are settled
/// before returning.
pub async fn run(mut scheduler: Scheduler, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(period_ms = period.as_millis() as u64, "Scheduler tick loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Some(job_id) = scheduler.tick(Utc::now()) {
                    debug!(%job_id, "Tick started a backup job");
                }
            }
        }
    }

    if scheduler.is_running() {
        info!("Waiting for the running backup to finish before shutdown");
    }
    if let Some(report) = scheduler.join_current().await {
        info!(
            job_id = %report.job_id,
            success = report.outcome.is_success(),
            "Final backup settled"
        );
    }
    info!("Scheduler tick loop stopped");
}
