//! Custom error types for the snapshot agent.

use thiserror::Error;

/// Failures while bringing the agent process up
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
