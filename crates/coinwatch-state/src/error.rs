use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or persisting coinwatch state.
#[derive(Debug, Error)]
pub enum StateError {
    /// File system failure while reading or writing the state file.
    #[error("state I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document could not be encoded or decoded as JSON.
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored value exists but does not have the expected shape.
    #[error("state document under '{key}' is malformed: {message}")]
    Corrupt { key: String, message: String },

    /// The backing store refused the write because it is out of space.
    #[error("storage quota exceeded: {needed} bytes requested, {quota} available")]
    QuotaExceeded { needed: usize, quota: usize },
}

impl StateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
