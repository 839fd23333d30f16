//! Connection pool manager
//!
//! `RedisConnectionPool` ties the pieces together: on `open` it walks the
//! configured endpoints round-robin, creates one connection factory per slot
//! and loads them into a `ResourcePool`; `borrow` and `release` lend those
//! factories out; `close` drains the pool and closes what it drained.
//!
//! Reconfiguring (`open` on an open pool, or `close`) while other tasks are
//! still borrowing is allowed but those tasks must expect `PoolNotOpen` or
//! `ForeignConnection` when they release.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use redpool_core::{Backend, PoolConfig, PoolError, PoolSettings, Result};
use redpool_driver_redis::RedisBackend;

use crate::factory::ConnectionFactory;
use crate::health::PoolHealth;
use crate::pool::{PoolStats, Pooled, ResourcePool};
use crate::retry::with_retry;
use crate::rotator::EndpointRotator;


/// A connection borrowed from a `RedisConnectionPool`
pub type PooledConnection<B = RedisBackend> = Pooled<ConnectionFactory<B>>;

enum PoolState<B: Backend> {
    Closed,
    Open {
        config: PoolConfig,
        pool: ResourcePool<ConnectionFactory<B>>,
    },
}

/// Bounded pool of connections spread across several endpoints
pub struct RedisConnectionPool<B: Backend = RedisBackend> {
    backend: Arc<B>,
    state: RwLock<PoolState<B>>,
    /// Serialises open, close and health checks
    lifecycle: tokio::sync::Mutex<()>,
}

impl RedisConnectionPool<RedisBackend> {
    /// Create a closed pool over the default Redis backend
    pub fn new() -> Self {
        Self::with_backend(RedisBackend::new())
    }
}

impl Default for RedisConnectionPool<RedisBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> RedisConnectionPool<B> {
    /// Create a closed pool over a custom backend
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            state: RwLock::new(PoolState::Closed),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Build the pool described by `config`, replacing any pool already open.
    ///
    /// In aggressive mode every connection is opened and pinged here and the
    /// first one that cannot be established fails the whole call. On failure
    /// the manager is left closed.
    #[tracing::instrument(
        skip(self, config),
        fields(mode = %config.mode(), size = config.size(), endpoints = config.endpoints().len())
    )]
    pub async fn open(&self, config: PoolConfig) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.shutdown().await;

        config.validate()?;
        tracing::info!("opening connection pool");

        let mut rotator = EndpointRotator::new(config.endpoints().to_vec())?;
        let backend = &self.backend;
        let mode = config.mode();
        let connect_timeout = config.connect_timeout();
        let retry = config.retry();

        let pool = ResourcePool::populate(config.size(), || {
            let endpoint = rotator.next_endpoint().clone();
            let backend = Arc::clone(backend);
            async move {
                with_retry(retry, |_| {
                    ConnectionFactory::create(
                        Arc::clone(&backend),
                        endpoint.clone(),
                        mode,
                        connect_timeout,
                    )
                })
                .await
            }
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to open connection pool");
            e
        })?;

        let pool_id = pool.id();
        *self.state.write() = PoolState::Open { config, pool };

        tracing::info!(%pool_id, "connection pool opened");
        Ok(())
    }

    /// Open from string-typed settings, e.g. as read from a TOML file.
    ///
    /// Fails with `InvalidMode` for an unknown mode. Any pool already open
    /// is closed either way.
    pub async fn open_settings(&self, settings: PoolSettings) -> Result<()> {
        match PoolConfig::try_from(settings) {
            Ok(config) => self.open(config).await,
            Err(e) => {
                tracing::error!(error = %e, "rejected pool settings");
                self.close().await;
                Err(e)
            }
        }
    }

    /// Close every available connection and mark the pool closed.
    ///
    /// A no-op when already closed. Connections still borrowed are closed
    /// when they are released or dropped.
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.shutdown().await;
    }

    /// Take a connection out of the pool without waiting.
    ///
    /// Fails with `PoolExhausted` when every connection is lent out.
    pub fn borrow(&self) -> Result<PooledConnection<B>> {
        let state = self.state.read();
        let PoolState::Open { pool, .. } = &*state else {
            return Err(PoolError::PoolNotOpen);
        };

        pool.borrow().ok_or_else(|| {
            tracing::debug!(capacity = pool.capacity(), "connection pool exhausted");
            PoolError::PoolExhausted
        })
    }

    /// Hand a borrowed connection back.
    ///
    /// A connection that cannot go back (the pool is closed, or it was
    /// borrowed from a pool that has since been replaced) is closed and the
    /// reason returned.
    pub async fn release(&self, conn: PooledConnection<B>) -> Result<()> {
        let rejected = {
            let state = self.state.read();
            match &*state {
                PoolState::Closed => Err((conn, PoolError::PoolNotOpen)),
                PoolState::Open { pool, .. } => pool
                    .release(conn)
                    .map_err(|conn| (conn, PoolError::ForeignConnection)),
            }
        };

        let Err((conn, error)) = rejected else {
            return Ok(());
        };

        let mut factory = conn.into_inner();
        tracing::debug!(
            endpoint = %factory.endpoint(),
            error = %error,
            "closing connection released outside its pool"
        );
        factory.close().await;
        Err(error)
    }

    /// Ping every available connection at most once.
    ///
    /// Connections that were never opened are counted as idle. A connection
    /// that fails its ping is reset so that its next borrower reconnects.
    #[tracing::instrument(skip(self))]
    pub async fn health_check(&self) -> Result<PoolHealth> {
        let _lifecycle = self.lifecycle.lock().await;
        let available = self.stats().ok_or(PoolError::PoolNotOpen)?.available();
        let mut health = PoolHealth::default();

        let mut seen = HashSet::with_capacity(available);

        for _ in 0..available {
            let mut conn = match self.borrow() {
                Ok(conn) => conn,
                Err(PoolError::PoolExhausted) => break,
                Err(e) => return Err(e),
            };
            // Released connections queue at the back, so a repeat means
            // every connection still available has been seen
            if !seen.insert(conn.slot()) {
                self.release(conn).await?;
                break;
            }
            health.checked += 1;

            if !conn.is_connected() {
                health.idle += 1;
            } else {
                let failure = match conn.ping().await {
                    Ok(true) => None,
                    Ok(false) => Some("unexpected ping reply".to_string()),
                    Err(e) => Some(e.to_string()),
                };

                match failure {
                    None => health.healthy += 1,
                    Some(reason) => {
                        let endpoint = conn.endpoint().clone();
                        tracing::warn!(%endpoint, %reason, "health ping failed, resetting connection");
                        if let Err(e) = conn.reset().await {
                            tracing::warn!(%endpoint, error = %e, "failed to reset connection");
                        }
                        health.failed.push(endpoint);
                    }
                }
            }

            self.release(conn).await?;
        }

        tracing::debug!(
            checked = health.checked,
            healthy = health.healthy,
            idle = health.idle,
            failed = health.failed.len(),
            "health check complete"
        );
        Ok(health)
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.read(), PoolState::Open { .. })
    }

    /// Occupancy of the open pool, `None` when closed
    pub fn stats(&self) -> Option<PoolStats> {
        match &*self.state.read() {
            PoolState::Open { pool, .. } => Some(pool.stats()),
            PoolState::Closed => None,
        }
    }

    /// Configuration of the open pool, `None` when closed
    pub fn config(&self) -> Option<PoolConfig> {
        match &*self.state.read() {
            PoolState::Open { config, .. } => Some(config.clone()),
            PoolState::Closed => None,
        }
    }

    /// Swap the state to closed and close whatever the old pool still holds.
    /// Callers hold the lifecycle lock.
    async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), PoolState::Closed);
        let PoolState::Open { pool, .. } = previous else {
            return;
        };

        let drained = pool.drain();
        let still_borrowed = pool.stats().borrowed();
        let closed = drained.len();
        for mut factory in drained {
            factory.close().await;
        }

        tracing::info!(
            pool_id = %pool.id(),
            closed,
            still_borrowed,
            "connection pool closed"
        );
    }
}

impl<B: Backend> std::fmt::Debug for RedisConnectionPool<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnectionPool")
            .field("backend", &self.backend.name())
            .field("open", &self.is_open())
            .field("stats", &self.stats())
            .finish()
    }
}
