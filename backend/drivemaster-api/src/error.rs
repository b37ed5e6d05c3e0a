use thiserror::Error;

/// Failure of an underlying store call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("document encoding error: {0}")]
    Encoding(#[from] mongodb::bson::ser::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("no content: {0}")]
    NoContent(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(message: impl Into<String>) -> Self {
        EngineError::NotFound(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        EngineError::InvalidState(message.into())
    }

    pub fn no_content(message: impl Into<String>) -> Self {
        EngineError::NoContent(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
pub type StoreResult<T> = Result<T, StoreError>;
