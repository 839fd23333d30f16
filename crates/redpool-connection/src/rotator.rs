//! Round-robin endpoint selection

use redpool_core::{Endpoint, PoolError, Result};

/// Cursor over a fixed endpoint list that wraps around forever
///
/// The i-th call to `next_endpoint` returns `endpoints[i % endpoints.len()]`.
#[derive(Debug, Clone)]
pub struct EndpointRotator {
    endpoints: Vec<Endpoint>,
    cursor: usize,
}

impl EndpointRotator {
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(PoolError::Configuration(
                "At least one endpoint is required".to_string(),
            ));
        }
        Ok(Self {
            endpoints,
            cursor: 0,
        })
    }

    pub fn next_endpoint(&mut self) -> &Endpoint {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        &self.endpoints[index]
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
