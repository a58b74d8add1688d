//! Cache-specific error types.

use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or expired. Expected control flow, not a fault.
    #[error("Value not found for key {0}")]
    NotFound(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Timed out connecting to cache at {0}")]
    ConnectTimeout(String),

    #[error("Cache store is closed")]
    Closed,

    #[error("Invalid cache configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the backend itself failed (as opposed to a miss or a bad payload).
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Redis(_) | Self::ConnectTimeout(_) | Self::Closed | Self::Config(_)
        )
    }
}
