//! Backend connection capability

use async_trait::async_trait;

use crate::{Endpoint, Result};

/// Opens, pings and closes physical connections to one kind of backend.
///
/// The pool never looks inside a `Handle`; it only moves it between the
/// backend and the borrower. Implementations report failures as
/// `PoolError::Backend`, the pool attaches the endpoint.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// A live connection
    type Handle: Send + 'static;

    /// Short name used in log events (e.g., "redis")
    fn name(&self) -> &'static str;

    /// Open a new connection to `endpoint`
    async fn open(&self, endpoint: &Endpoint) -> Result<Self::Handle>;

    /// Liveness check. `Ok(false)` means the backend answered but not as expected.
    async fn ping(&self, handle: &mut Self::Handle) -> Result<bool>;

    /// Shut down a connection
    async fn close(&self, handle: Self::Handle) -> Result<()>;
}

#[async_trait]
impl<T: Backend> Backend for std::sync::Arc<T> {
    type Handle = T::Handle;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<Self::Handle> {
        (**self).open(endpoint).await
    }

    async fn ping(&self, handle: &mut Self::Handle) -> Result<bool> {
        (**self).ping(handle).await
    }

    async fn close(&self, handle: Self::Handle) -> Result<()> {
        (**self).close(handle).await
    }
}
