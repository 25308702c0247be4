//! Quiescing the owning process around the archive step.
//!
//! The host exposes two things: a saving-disabled flag that its own periodic
//! save consults, and a blocking flush. [`QuiesceGuard`] pairs disabling with
//! re-enabling so no exit path, including a panic, leaves the host un-saving.

use crate::error::HostError;
use crate::notice::{Notice, Notifier};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOptions {
    /// Wait until state is durable before returning
    pub blocking: bool,
    /// Also flush per-user/player data
    pub flush_player_data: bool,
    /// Flush even if the host thinks nothing changed
    pub force: bool,
}

impl FlushOptions {
    pub const FULL: Self = Self {
        blocking: true,
        flush_player_data: true,
        force: true,
    };
}

/// The process whose directory is being archived
pub trait Host: Send + Sync {
    /// Toggle the saving-disabled flag of every managed partition
    fn set_saving_disabled(&self, disabled: bool) -> Result<(), HostError>;

    fn flush_all(&self, options: FlushOptions) -> Result<(), HostError>;
}

/// Auto-save is disabled for as long as this guard lives
pub struct QuiesceGuard<'a> {
    host: &'a dyn Host,
    notifier: &'a dyn Notifier,
}

impl<'a> QuiesceGuard<'a> {
    /// Disable auto-save. If the host fails part way, auto-save is re-enabled
    /// before the error is returned.
    pub fn acquire(host: &'a dyn Host, notifier: &'a dyn Notifier) -> Result<Self, HostError> {
        notifier.notify(Notice::AutoSaveDisabled);
        let guard = Self { host, notifier };
        guard.host.set_saving_disabled(true)?;
        tracing::debug!("Automatic saving disabled");
        Ok(guard)
    }

    /// Force all pending state to disk before returning
    pub fn flush_all(&self, options: FlushOptions) -> Result<(), HostError> {
        self.notifier.notify(Notice::SavingGame);
        self.host.flush_all(options)?;
        self.notifier.notify(Notice::SavedGame);
        Ok(())
    }
}

impl Drop for QuiesceGuard<'_> {
    fn drop(&mut self) {
        self.notifier.notify(Notice::AutoSaveEnabled);
        match self.host.set_saving_disabled(false) {
            Ok(()) => tracing::debug!("Automatic saving re-enabled"),
            Err(e) => tracing::error!(error = %e, "Failed to re-enable automatic saving"),
        }
    }
}

type FlushFn = Box<dyn Fn(FlushOptions) -> Result<(), HostError> + Send + Sync>;

/// In-process host: one saving-disabled flag per named partition.
///
/// An embedding application checks [`SaveGate::is_saving_disabled`] before
/// each of its own periodic saves, and supplies the flush routine.
pub struct SaveGate {
    partitions: BTreeMap<String, AtomicBool>,
    flush: FlushFn,
}

impl SaveGate {
    pub fn new<I, S, F>(partitions: I, flush: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(FlushOptions) -> Result<(), HostError> + Send + Sync + 'static,
    {
        Self {
            partitions: partitions
                .into_iter()
                .map(|name| (name.into(), AtomicBool::new(false)))
                .collect(),
            flush: Box::new(flush),
        }
    }

    /// Unknown partitions are never disabled
    pub fn is_saving_disabled(&self, partition: &str) -> bool {
        self.partitions
            .get(partition)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }
}

impl Host for SaveGate {
    fn set_saving_disabled(&self, disabled: bool) -> Result<(), HostError> {
        for flag in self.partitions.values() {
            flag.store(disabled, Ordering::Release);
        }
        Ok(())
    }

    fn flush_all(&self, options: FlushOptions) -> Result<(), HostError> {
        (self.flush)(options)
    }
}
