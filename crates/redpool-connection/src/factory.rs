//! Pooled connection factory
//!
//! A `ConnectionFactory` is the unit the pool hands out: it is bound to one
//! endpoint for its whole life and owns at most one live backend handle.
//! In lazy mode the handle is opened on first use; in aggressive mode it is
//! opened and pinged before the factory is returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use redpool_core::{Backend, Endpoint, PoolError, PoolMode, Result};

use crate::pool::PoolResource;


/// Lifecycle of a factory's physical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryState {
    /// No connection opened yet (or reset after a failure)
    Unconnected,
    /// A live handle is held
    Connected,
    /// Terminal; every further operation fails
    Closed,
}

/// One pooled connection slot bound to a single endpoint
pub struct ConnectionFactory<B: Backend> {
    backend: Arc<B>,
    endpoint: Endpoint,
    mode: PoolMode,
    connect_timeout: Option<Duration>,
    handle: Option<B::Handle>,
    state: FactoryState,
}

impl<B: Backend> ConnectionFactory<B> {
    /// Create a factory for `endpoint`.
    ///
    /// Lazy mode performs no I/O. Aggressive mode connects and pings now and
    /// fails with `ConnectFailed` if either step fails.
    pub async fn create(
        backend: Arc<B>,
        endpoint: Endpoint,
        mode: PoolMode,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut factory = Self {
            backend,
            endpoint,
            mode,
            connect_timeout,
            handle: None,
            state: FactoryState::Unconnected,
        };

        if mode == PoolMode::Aggressive {
            factory.connect(true).await?;
        }

        Ok(factory)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn mode(&self) -> PoolMode {
        self.mode
    }

    pub fn state(&self) -> FactoryState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == FactoryState::Connected
    }

    /// Open the connection if it is not open yet and return the live handle
    pub async fn ensure_connected(&mut self) -> Result<&mut B::Handle> {
        match self.state {
            FactoryState::Closed => return Err(PoolError::UseAfterClose(self.endpoint.clone())),
            FactoryState::Unconnected => self.connect(false).await?,
            FactoryState::Connected => {}
        }

        match self.handle.as_mut() {
            Some(handle) => Ok(handle),
            None => Err(PoolError::UseAfterClose(self.endpoint.clone())),
        }
    }

    /// Ping the connection, connecting first if needed
    pub async fn ping(&mut self) -> Result<bool> {
        let endpoint = self.endpoint.clone();
        let backend = Arc::clone(&self.backend);
        let handle = self.ensure_connected().await?;

        backend
            .ping(handle)
            .await
            .map_err(|e| PoolError::connect_failed(&endpoint, cause_of(e)))
    }

    /// Drop the live connection but keep the factory usable; the next use
    /// reconnects. Use after a command fails with a broken connection.
    pub async fn reset(&mut self) -> Result<()> {
        match self.state {
            FactoryState::Closed => Err(PoolError::UseAfterClose(self.endpoint.clone())),
            FactoryState::Unconnected => Ok(()),
            FactoryState::Connected => {
                if let Some(handle) = self.handle.take() {
                    self.close_handle(handle).await;
                }
                self.state = FactoryState::Unconnected;
                tracing::debug!(endpoint = %self.endpoint, "connection reset");
                Ok(())
            }
        }
    }

    /// Close the connection. Idempotent and never fails; close errors are
    /// logged so that one bad connection cannot stop a pool teardown.
    pub async fn close(&mut self) {
        if self.state == FactoryState::Closed {
            return;
        }
        if let Some(handle) = self.handle.take() {
            self.close_handle(handle).await;
        }
        self.state = FactoryState::Closed;
        tracing::debug!(endpoint = %self.endpoint, "connection factory closed");
    }

    async fn connect(&mut self, verify: bool) -> Result<()> {
        let deadline = self
            .connect_timeout
            .map(|timeout| (Instant::now() + timeout, timeout));

        match self.open_handle(verify, deadline).await {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = FactoryState::Connected;
                tracing::debug!(
                    endpoint = %self.endpoint,
                    backend = self.backend.name(),
                    verified = verify,
                    "connection established"
                );
                Ok(())
            }
            Err(e) => {
                let error = PoolError::connect_failed(&self.endpoint, cause_of(e));
                tracing::debug!(endpoint = %self.endpoint, error = %error, "connect failed");
                Err(error)
            }
        }
    }

    /// Open and optionally ping, both under the same deadline. The handle is
    /// held outside the timed futures so a slow ping still gets it closed.
    async fn open_handle(
        &mut self,
        verify: bool,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<B::Handle> {
        let mut handle = before(deadline, self.backend.open(&self.endpoint)).await?;
        if !verify {
            return Ok(handle);
        }

        let answered = before(deadline, self.backend.ping(&mut handle)).await;
        match answered {
            Ok(true) => Ok(handle),
            Ok(false) => {
                self.close_handle(handle).await;
                Err(PoolError::Backend("liveness check failed".to_string()))
            }
            Err(e) => {
                self.close_handle(handle).await;
                Err(e)
            }
        }
    }

    async fn close_handle(&mut self, handle: B::Handle) {
        if let Err(e) = self.backend.close(handle).await {
            tracing::warn!(endpoint = %self.endpoint, error = %e, "error closing connection");
        }
    }
}

#[async_trait]
impl<B: Backend> PoolResource for ConnectionFactory<B> {
    async fn close(&mut self) {
        ConnectionFactory::close(self).await
    }
}

impl<B: Backend> std::fmt::Debug for ConnectionFactory<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish()
    }
}

/// Run `operation` to completion or until `deadline` passes
async fn before<T>(
    deadline: Option<(Instant, Duration)>,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some((at, timeout)) = deadline else {
        return operation.await;
    };

    tokio::time::timeout_at(at, operation)
        .await
        .unwrap_or_else(|_| {
            Err(PoolError::Backend(format!(
                "timed out after {}ms",
                timeout.as_millis()
            )))
        })
}

fn cause_of(error: PoolError) -> String {
    match error {
        PoolError::Backend(cause) => cause,
        PoolError::ConnectFailed { cause, .. } => cause,
        other => other.to_string(),
    }
}
