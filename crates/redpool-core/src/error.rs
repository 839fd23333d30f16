//! Error types for redpool

use thiserror::Error;

use crate::Endpoint;

/// Core error type for pool operations
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid connection mode: {0}")]
    InvalidMode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to connect to {endpoint}: {cause}")]
    ConnectFailed { endpoint: Endpoint, cause: String },

    #[error("No pooled connection available")]
    PoolExhausted,

    #[error("Connection pool is not open")]
    PoolNotOpen,

    #[error("Connection to {0} used after close")]
    UseAfterClose(Endpoint),

    #[error("Connection was not borrowed from the current pool")]
    ForeignConnection,

    #[error("Backend error: {0}")]
    Backend(String),
}

impl PoolError {
    /// Build a `ConnectFailed` for `endpoint` from any displayable cause.
    pub fn connect_failed(endpoint: &Endpoint, cause: impl std::fmt::Display) -> Self {
        PoolError::ConnectFailed {
            endpoint: endpoint.clone(),
            cause: cause.to_string(),
        }
    }

    /// Exhaustion is backpressure, not a failure of the pool.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PoolError::PoolExhausted)
    }
}

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;
