//! Long-running tasks of the agent process.

pub mod shutdown;
pub mod ticker;

pub use shutdown::ShutdownCoordinator;
