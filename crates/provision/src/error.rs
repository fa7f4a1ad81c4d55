//! Error types for plan execution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while applying a plan through a backend.
///
/// Each error ends the current host's plan. Whether it also ends the run
/// is decided by [`crate::ExecPolicy`].
#[derive(Debug, Error)]
pub enum ExecError {
    /// An external program could not be started
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program ran and reported failure
    #[error("{command} failed ({status}): {stderr}")]
    CommandFailed {
        /// Rendered command line
        command: String,
        /// Exit status description
        status: String,
        stderr: String,
    },

    /// The active provider cannot perform the request
    #[error("{provider} does not support {what}")]
    Unsupported { provider: String, what: String },

    /// A disk image exists and the entry does not allow reusing it
    #[error("disk image {} already exists (set allowExisting to reuse it)", path.display())]
    StorageExists { path: PathBuf },

    /// Writing a generated file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for execution operations.
pub type Result<T> = std::result::Result<T, ExecError>;
