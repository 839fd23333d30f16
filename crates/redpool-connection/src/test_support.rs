//! Shared test doubles for pool tests

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use redpool_core::{Backend, Endpoint, PoolError, Result};

/// Handle produced by `MockBackend`
#[derive(Debug)]
pub struct MockHandle {
    pub id: usize,
    pub endpoint: Endpoint,
}

/// In-memory backend that counts every open, close and ping
#[derive(Default)]
pub struct MockBackend {
    opened: AtomicUsize,
    closed: AtomicUsize,
    pings: AtomicUsize,
    unreachable: Mutex<HashSet<Endpoint>>,
    failing_ping: Mutex<HashSet<Endpoint>>,
    /// Number of upcoming opens that fail regardless of endpoint
    flaky_opens: AtomicUsize,
    open_delay: Mutex<Option<Duration>>,
    ping_delay: Mutex<Option<Duration>>,
    fail_close: AtomicBool,
    opened_endpoints: Mutex<Vec<Endpoint>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unreachable(&self, endpoint: &str) {
        self.unreachable.lock().insert(Endpoint::new(endpoint));
    }

    pub fn set_reachable(&self, endpoint: &str) {
        self.unreachable.lock().remove(&Endpoint::new(endpoint));
    }

    pub fn set_failing_ping(&self, endpoint: &str) {
        self.failing_ping.lock().insert(Endpoint::new(endpoint));
    }

    pub fn fail_next_opens(&self, count: usize) {
        self.flaky_opens.store(count, Ordering::SeqCst);
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = Some(delay);
    }

    pub fn set_ping_delay(&self, delay: Duration) {
        *self.ping_delay.lock() = Some(delay);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet closed
    pub fn live(&self) -> usize {
        self.opened() - self.closed()
    }

    /// Endpoints in the order connections were opened to them
    pub fn opened_endpoints(&self) -> Vec<String> {
        self.opened_endpoints
            .lock()
            .iter()
            .map(|e| e.to_string())
            .collect()
    }
}

#[async_trait]
impl Backend for MockBackend {
    type Handle = MockHandle;

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<MockHandle> {
        let delay = *self.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let flaky = self
            .flaky_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if flaky {
            return Err(PoolError::Backend("connection reset by peer".to_string()));
        }
        if self.unreachable.lock().contains(endpoint) {
            return Err(PoolError::Backend("connection refused".to_string()));
        }

        let id = self.opened.fetch_add(1, Ordering::SeqCst);
        self.opened_endpoints.lock().push(endpoint.clone());
        Ok(MockHandle {
            id,
            endpoint: endpoint.clone(),
        })
    }

    async fn ping(&self, handle: &mut MockHandle) -> Result<bool> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let delay = *self.ping_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(!self.failing_ping.lock().contains(&handle.endpoint))
    }

    async fn close(&self, _handle: MockHandle) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(PoolError::Backend("close failed".to_string()));
        }
        Ok(())
    }
}

/// Route log events to the test harness; set `RUST_LOG` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
