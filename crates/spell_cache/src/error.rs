use std::io;

use layout_store::StorageError;
use thiserror::Error;

/// Why an upstream fetch produced nothing usable.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("upstream answered with status {status}")]
    Status { status: u16 },
    #[error("file read error: {0}")]
    File(#[from] io::Error),
    #[error("undecodable payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ReferenceError {
    /// Transport error, non-OK status, undecodable payload or no exact match.
    #[error("failed to fetch reference `{name}`: {reason}")]
    FetchFailed { name: String, reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReferenceError {
    pub(crate) fn fetch_failed(name: &str, reason: impl ToString) -> Self {
        Self::FetchFailed {
            name: name.to_owned(),
            reason: reason.to_string(),
        }
    }
}
