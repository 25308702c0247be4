//! Host adapter that drives the owning process through shell commands.
//!
//! Typical setup for a game server is an RCON client:
//! `save_off = ["rcon-cli", "save-off"]`, `flush = ["rcon-cli", "save-all", "flush"]`,
//! `save_on = ["rcon-cli", "save-on"]`. An empty command is a no-op.

use savepoint_core::error::HostError;
use savepoint_core::quiesce::{FlushOptions, Host};
use serde::{Deserialize, Serialize};
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Disables the host's periodic auto-save
    #[serde(default)]
    pub save_off: Vec<String>,

    /// Re-enables the host's periodic auto-save
    #[serde(default)]
    pub save_on: Vec<String>,

    /// Blocks until the host has written all pending state
    #[serde(default)]
    pub flush: Vec<String>,
}

pub struct CommandHost {
    config: HostConfig,
}

impl CommandHost {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }
}

impl Host for CommandHost {
    fn set_saving_disabled(&self, disabled: bool) -> Result<(), HostError> {
        if disabled {
            run(&self.config.save_off)
        } else {
            run(&self.config.save_on)
        }
    }

    fn flush_all(&self, options: FlushOptions) -> Result<(), HostError> {
        debug!(?options, "Flushing host state");
        run(&self.config.flush)
    }
}

fn run(argv: &[String]) -> Result<(), HostError> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(());
    };

    let output = Command::new(program).args(args).output()?;
    if !output.status.success() {
        return Err(HostError::Command {
            command: argv.join(" "),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    debug!(command = %argv.join(" "), "Host command succeeded");
    Ok(())
}
