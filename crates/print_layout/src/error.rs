use layout_store::StorageError;
use spell_cache::ReferenceError;
use thiserror::Error;

use crate::version::SchemaVersion;

#[derive(Debug, Error)]
pub enum LayoutError {
    /// The storage engine could not be opened; editing continues in memory.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("storage used before init()")]
    NotInitialized,
    #[error("failed to fetch reference `{name}`: {reason}")]
    ReferenceFetchFailed { name: String, reason: String },
    /// The document is older than the running schema and was not applied.
    #[error("layout version {found} is older than the supported version {current}; not applied")]
    VersionMismatch {
        found: SchemaVersion,
        current: SchemaVersion,
    },
    #[error("original element `{0}` not found on the page")]
    OriginalNotFound(String),
    #[error("invalid layout document: {0}")]
    InvalidDocument(String),
    #[error("floating element id `{0}` is already in use")]
    DuplicateId(String),
    #[error("no floating element with id `{0}`")]
    UnknownElement(String),
    #[error("element `{0}` is already extracted")]
    AlreadyExtracted(String),
    #[error("invalid merge: {0}")]
    InvalidMerge(String),
    #[error("DOM error: {0}")]
    Dom(#[from] anyhow::Error),
}

impl From<StorageError> for LayoutError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotInitialized => Self::NotInitialized,
            StorageError::Unavailable { reason } => Self::StorageUnavailable(reason),
            other @ (StorageError::Write { .. } | StorageError::Encode { .. }) => {
                Self::StorageUnavailable(other.to_string())
            }
        }
    }
}

impl From<ReferenceError> for LayoutError {
    fn from(err: ReferenceError) -> Self {
        match err {
            ReferenceError::FetchFailed { name, reason } => Self::ReferenceFetchFailed { name, reason },
            ReferenceError::Storage(storage) => storage.into(),
        }
    }
}
