//! Error types shared across the cleanup engine.
//!
//! Per-file failures are never surfaced here: they are reported as
//! [`MoveResult::Error`](crate::file_organizer::MoveResult) values and counted
//! in the pass statistics. The types below cover failures that end a pass.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or compiling configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be parsed.
    #[error("Invalid configuration in {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    /// IO error while reading or writing configuration.
    #[error("IO error accessing configuration: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by revert ledger storage.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// No platform data directory could be determined for the default store.
    #[error("Could not determine a data directory for revert information")]
    NoDataDir,

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize revert snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The temporary snapshot could not be moved into place.
    #[error("Failed to persist revert snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Errors that abort a cleanup or revert pass.
#[derive(Error, Debug)]
pub enum CleanupError {
    /// The target directory does not exist or is not a directory.
    #[error("The specified directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for cleanup and revert passes.
pub type CleanupResult<T> = Result<T, CleanupError>;
