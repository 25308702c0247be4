//! Savepoint Agent Library
//!
//! Runs the backup scheduler next to a host process and exposes its trigger
//! surface over HTTP, with progress notices streamed over WebSocket.

pub mod api;
pub mod config;
pub mod daemon;
pub mod host;
pub mod utils;
pub mod ws;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::AgentError;
