use thiserror::Error;

/// Typed error taxonomy shared by the engine boundaries.
///
/// Analyzers never surface errors — they degrade to zero/default results.
/// Errors appear only at the RPC and store boundaries and carry the
/// offending identifier.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("decode failure: {0}")]
    Decode(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("capacity refusal: {0}")]
    Capacity(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Network(e.to_string())
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => EngineError::NotFound("row".to_string()),
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
