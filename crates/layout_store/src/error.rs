use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying engine could not be opened. Persistence is unavailable,
    /// in-memory editing is not affected.
    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },
    /// An operation ran before `init()`.
    #[error("storage used before init()")]
    NotInitialized,
    #[error("failed to write collection `{collection}`: {reason}")]
    Write {
        collection: &'static str,
        reason: String,
    },
    #[error("failed to encode collection `{collection}`: {source}")]
    Encode {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
