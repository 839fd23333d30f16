//! redpool connection - the connection pool itself
//!
//! This crate owns the pool lifecycle: spreading connections across
//! endpoints, populating the pool lazily or aggressively, and lending
//! connections out to concurrent callers.

pub mod factory;
mod health;
mod manager;
pub mod pool;
pub mod retry;
mod rotator;

#[cfg(test)]
mod test_support;

pub use factory::{ConnectionFactory, FactoryState};
pub use health::PoolHealth;
pub use manager::{PooledConnection, RedisConnectionPool};
pub use pool::{PoolResource, PoolStats, Pooled, ResourcePool};
pub use rotator::EndpointRotator;

pub use redpool_core::{
    Backend, Endpoint, PoolConfig, PoolError, PoolMode, PoolSettings, Result, RetryPolicy,
};
pub use redpool_driver_redis::{RedisBackend, RedisBackendConfig, RedisConnection};
