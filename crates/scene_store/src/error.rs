//! Sample store error types

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Sample store error
#[derive(Debug, Error)]
pub enum StoreError {
    /// Dataset file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata record is not valid JSON for its table
    #[error("invalid record in {path} line {line}: {source}")]
    Record {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Record references something the manifest does not declare
    #[error("inconsistent dataset in {path}: {message}")]
    Inconsistent { path: PathBuf, message: String },

    /// Scene selector matches nothing
    #[error("no scene matches '{selector}'")]
    UnknownScene { selector: String },

    /// Shared contract error (payload decode etc.)
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl StoreError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn inconsistent(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Inconsistent {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Sample store Result alias
pub type Result<T> = std::result::Result<T, StoreError>;
