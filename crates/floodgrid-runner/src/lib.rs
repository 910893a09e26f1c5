//! Library side of the `floodgrid` CLI.
//!
//! The binary parses arguments and prints reports; everything it does lives
//! here so integration tests and other tools can reuse it:
//!
//! - [`snapshot`]: reading point files and atomically writing cluster snapshots.
//! - [`commands`]: `generate`, `clusters`, `sub-clusters`, `points`, `summary`,
//!   `purge`, `encode` and `decode`.

pub mod commands;
mod error;
pub mod snapshot;

pub use error::RunnerError;

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
