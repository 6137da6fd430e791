//! Error types for crewclock-core operations.
//!
//! Guard violations (scan while paused, lunch with no workers, wrong
//! procedure code) are not errors; they come back as typed feedback values
//! in `Ok`. This enum covers the genuinely failable edges: filesystem and
//! serialization.

use std::path::PathBuf;

/// All errors that can occur in crewclock-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot path has no parent directory: {0}")]
    SnapshotPathInvalid(PathBuf),
}

/// Convenience type alias for Results using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
