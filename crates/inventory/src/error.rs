//! Error types for inventory loading.
//!
//! None of these are meant to stop a run: callers degrade to an empty
//! inventory or an empty group-variable mapping and keep going.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading inventory documents.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The host inventory could not be parsed or has the wrong shape
    #[error("malformed inventory {}: {reason}", path.display())]
    Malformed {
        /// Document that failed to load
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The group variables document could not be parsed
    #[error("malformed group variables {}: {reason}", path.display())]
    GroupVarsMalformed {
        /// Document that failed to load
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Reading or writing an inventory file failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, LoadError>;
