use thiserror::Error;

/// Errors returned by identity store operations.
#[derive(Debug, Error)]
pub enum FaceStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown person: {0}")]
    UnknownPerson(String),

    #[error("no staged samples for {0}")]
    NothingStaged(String),
}
