//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of a resource pool's occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of instances the pool was populated with
    capacity: usize,
    /// Number of instances ready to be borrowed
    available: usize,
    /// Number of instances currently lent out
    borrowed: usize,
}

impl PoolStats {
    pub fn new(capacity: usize, available: usize, borrowed: usize) -> Self {
        Self {
            capacity,
            available,
            borrowed,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.available
    }

    pub fn borrowed(&self) -> usize {
        self.borrowed
    }

    /// Fraction of the capacity currently lent out (0.0 to 1.0)
    ///
    /// Returns 0.0 for an empty pool.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.borrowed as f64 / self.capacity as f64
        }
    }

    /// True when a borrow would find nothing available
    pub fn is_exhausted(&self) -> bool {
        self.available == 0
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}
