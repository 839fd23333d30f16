//! Pool health summary

use redpool_core::Endpoint;
use serde::{Deserialize, Serialize};

/// Result of pinging every idle connection in a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHealth {
    /// Connections examined (those available when the check ran)
    pub checked: usize,
    /// Connected and answered the ping
    pub healthy: usize,
    /// Never connected yet, so not pinged
    pub idle: usize,
    /// Endpoints whose connection failed the ping and was reset
    pub failed: Vec<Endpoint>,
}

impl PoolHealth {
    /// True when no pinged connection failed
    pub fn is_healthy(&self) -> bool {
        self.failed.is_empty()
    }
}
