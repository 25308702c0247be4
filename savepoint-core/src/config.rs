//! Backup configuration and the reloadable snapshot store.
//!
//! The scheduler and the job runner never hold a mutable reference to the
//! configuration. They read an `Arc<BackupConfig>` snapshot, and `reload`
//! swaps that snapshot between ticks.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Upper bound for `minutes_between_backups`
pub const MAX_MINUTES_BETWEEN_BACKUPS: i64 = i32::MAX as i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Whether ticks may start backups at all
    #[serde(default = "default_automatic_backups")]
    pub automatic_backups: bool,

    /// Minutes between the end of one backup and the start of the next
    #[serde(default = "default_minutes_between_backups")]
    pub minutes_between_backups: i64,

    /// Number of archives to keep, `<= 0` disables pruning
    #[serde(default = "default_backups_to_keep")]
    pub backups_to_keep: i32,
}

fn default_automatic_backups() -> bool {
    true
}

fn default_minutes_between_backups() -> i64 {
    60
}

fn default_backups_to_keep() -> i32 {
    -1
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            automatic_backups: default_automatic_backups(),
            minutes_between_backups: default_minutes_between_backups(),
            backups_to_keep: default_backups_to_keep(),
        }
    }
}

impl BackupConfig {
    /// Interval between automatic backups, at millisecond resolution
    pub fn interval(&self) -> chrono::Duration {
        let minutes = self.minutes_between_backups.clamp(0, i64::MAX / 60_000);
        chrono::Duration::milliseconds(minutes * 60_000)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minutes_between_backups <= 0
            || self.minutes_between_backups > MAX_MINUTES_BETWEEN_BACKUPS
        {
            return Err(ConfigError::Invalid(format!(
                "minutes_between_backups must be between 1 and {}, got {}",
                MAX_MINUTES_BETWEEN_BACKUPS, self.minutes_between_backups
            )));
        }
        Ok(())
    }
}

type Loader = Box<dyn Fn() -> Result<BackupConfig, ConfigError> + Send + Sync>;

/// Holds the active configuration snapshot and knows how to reload it.
pub struct ConfigStore {
    current: RwLock<Arc<BackupConfig>>,
    loader: Loader,
}

impl ConfigStore {
    /// Run the loader once and keep it for later reloads
    pub fn load<F>(loader: F) -> Result<Self, ConfigError>
    where
        F: Fn() -> Result<BackupConfig, ConfigError> + Send + Sync + 'static,
    {
        let config = loader()?;
        config.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(config)),
            loader: Box::new(loader),
        })
    }

    /// A store whose reload always yields `config`
    pub fn fixed(config: BackupConfig) -> Self {
        let snapshot = config.clone();
        Self {
            current: RwLock::new(Arc::new(config)),
            loader: Box::new(move || Ok(snapshot.clone())),
        }
    }

    pub fn current(&self) -> Arc<BackupConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-run the loader and swap the snapshot. On error the previous
    /// snapshot stays active.
    pub fn reload(&self) -> Result<Arc<BackupConfig>, ConfigError> {
        let config = (self.loader)()?;
        config.validate()?;

        let config = Arc::new(config);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = config.clone();
        tracing::info!(
            automatic_backups = config.automatic_backups,
            minutes_between_backups = config.minutes_between_backups,
            backups_to_keep = config.backups_to_keep,
            "Configuration reloaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_defaults() {
        let config = BackupConfig::default();
        assert!(config.automatic_backups);
        assert_eq!(config.minutes_between_backups, 60);
        assert_eq!(config.backups_to_keep, -1);
        assert_eq!(config.interval(), chrono::Duration::milliseconds(3_600_000));
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: BackupConfig = serde_json::from_str(r#"{"backups_to_keep": 5}"#).unwrap();
        assert!(config.automatic_backups);
        assert_eq!(config.minutes_between_backups, 60);
        assert_eq!(config.backups_to_keep, 5);
    }

    #[test]
    fn test_validate_rejects_non_positive_interval() {
        let config = BackupConfig {
            minutes_between_backups: 0,
            ..BackupConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_bounds_interval() {
        let config = BackupConfig {
            minutes_between_backups: MAX_MINUTES_BETWEEN_BACKUPS,
            ..BackupConfig::default()
        };
        assert!(config.validate().is_ok());

        let config = BackupConfig {
            minutes_between_backups: 1_000_000_000_000,
            ..BackupConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let source = Arc::new(Mutex::new(BackupConfig::default()));
        let loader_source = source.clone();
        let store = ConfigStore::load(move || Ok(loader_source.lock().unwrap().clone())).unwrap();
        let before = store.current();

        source.lock().unwrap().backups_to_keep = 3;
        let reloaded = store.reload().unwrap();

        assert_eq!(reloaded.backups_to_keep, 3);
        assert_eq!(store.current().backups_to_keep, 3);
        // Readers holding the old snapshot are unaffected
        assert_eq!(before.backups_to_keep, -1);
    }

    #[test]
    fn test_failed_reload_keeps_previous_snapshot() {
        let fail = Arc::new(Mutex::new(false));
        let loader_fail = fail.clone();
        let store = ConfigStore::load(move || {
            if *loader_fail.lock().unwrap() {
                Err(ConfigError::Parse("unexpected token".to_string()))
            } else {
                Ok(BackupConfig::default())
            }
        })
        .unwrap();

        *fail.lock().unwrap() = true;
        assert!(store.reload().is_err());
        assert_eq!(*store.current(), BackupConfig::default());
    }

    #[test]
    fn test_invalid_reload_is_rejected() {
        let source = Arc::new(Mutex::new(BackupConfig::default()));
        let loader_source = source.clone();
        let store = ConfigStore::load(move || Ok(loader_source.lock().unwrap().clone())).unwrap();

        source.lock().unwrap().minutes_between_backups = -5;
        assert!(matches!(store.reload(), Err(ConfigError::Invalid(_))));
        assert_eq!(store.current().minutes_between_backups, 60);
    }
}
