//! Resource pool implementation

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use redpool_core::{PoolError, Result};
use uuid::Uuid;

use super::stats::PoolStats;

/// Something a pool can hold and must shut down on teardown
#[async_trait]
pub trait PoolResource: Send + 'static {
    /// Release the resource. Must not fail; log instead.
    async fn close(&mut self);
}

/// An instance lent out by a `ResourcePool`
///
/// The borrower owns the instance until it is handed back with
/// `ResourcePool::release`. The pool id and slot let the pool reject
/// instances that did not come from it.
///
/// Dropping a `Pooled` without releasing it returns the instance to its
/// pool. If that pool has been drained or dropped the instance is closed on
/// the current runtime instead.
pub struct Pooled<T: PoolResource> {
    pool_id: Uuid,
    slot: usize,
    /// `None` only once the instance has been moved out
    item: Option<T>,
    home: Weak<Mutex<Slots<T>>>,
}

impl<T: PoolResource> Pooled<T> {
    /// Position of the instance in the pool, in population order
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn pool_id(&self) -> Uuid {
        self.pool_id
    }

    /// Take the instance out for good; it can no longer be released
    pub(crate) fn into_inner(mut self) -> T {
        self.item.take().expect("pooled instance already taken")
    }
}

impl<T: PoolResource> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled instance already taken")
    }
}

impl<T: PoolResource> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled instance already taken")
    }
}

impl<T: PoolResource> Drop for Pooled<T> {
    fn drop(&mut self) {
        let Some(item) = self.item.take() else {
            return;
        };

        if let Some(home) = self.home.upgrade() {
            let mut slots = home.lock();
            if !slots.drained && slots.borrowed.remove(&self.slot) {
                slots.available.push_back((self.slot, item));
                tracing::debug!(
                    pool_id = %self.pool_id,
                    slot = self.slot,
                    "dropped instance returned to pool"
                );
                return;
            }
        }

        close_detached(self.pool_id, self.slot, item);
    }
}

impl<T: PoolResource + std::fmt::Debug> std::fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled")
            .field("pool_id", &self.pool_id)
            .field("slot", &self.slot)
            .field("item", &self.item)
            .finish()
    }
}

/// Close an instance whose pool is gone. Outside a runtime it is only
/// dropped.
fn close_detached<T: PoolResource>(pool_id: Uuid, slot: usize, mut item: T) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            tracing::debug!(%pool_id, slot, "closing instance dropped after drain");
            runtime.spawn(async move { item.close().await });
        }
        Err(_) => {
            tracing::warn!(%pool_id, slot, "instance dropped outside a runtime, not closed");
        }
    }
}

struct Slots<T> {
    /// Idle instances, handed out front first
    available: VecDeque<(usize, T)>,
    /// Slots currently lent out
    borrowed: HashSet<usize>,
    drained: bool,
}

/// A fixed-size pool of instances created up front
///
/// Borrowing never waits: an empty pool answers `None` and the caller
/// decides what to do. `available + borrowed == capacity` holds until the
/// pool is drained.
pub struct ResourcePool<T> {
    id: Uuid,
    capacity: usize,
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T: PoolResource> ResourcePool<T> {
    /// Build a pool of `capacity` instances by calling `init` once per slot.
    ///
    /// The first failure aborts population: every instance created so far is
    /// closed and the error is returned.
    pub async fn populate<F, Fut>(capacity: usize, mut init: F) -> Result<Self>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if capacity == 0 {
            return Err(PoolError::Configuration(
                "Pool capacity must be greater than 0".to_string(),
            ));
        }

        let mut created: Vec<(usize, T)> = Vec::with_capacity(capacity);
        for slot in 0..capacity {
            match init().await {
                Ok(item) => created.push((slot, item)),
                Err(e) => {
                    tracing::error!(
                        slot,
                        created = created.len(),
                        error = %e,
                        "pool population failed, closing created instances"
                    );
                    for (_, mut item) in created {
                        item.close().await;
                    }
                    return Err(e);
                }
            }
        }

        let id = Uuid::new_v4();
        tracing::debug!(pool_id = %id, capacity, "pool populated");

        Ok(Self {
            id,
            capacity,
            slots: Arc::new(Mutex::new(Slots {
                available: created.into(),
                borrowed: HashSet::with_capacity(capacity),
                drained: false,
            })),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take one available instance, or `None` if every instance is lent out
    pub fn borrow(&self) -> Option<Pooled<T>> {
        let mut slots = self.slots.lock();
        let (slot, item) = slots.available.pop_front()?;
        slots.borrowed.insert(slot);

        Some(Pooled {
            pool_id: self.id,
            slot,
            item: Some(item),
            home: Arc::downgrade(&self.slots),
        })
    }

    /// Return a borrowed instance.
    ///
    /// The instance is handed back in `Err` if it was borrowed from another
    /// pool, its slot is not lent out, or this pool has been drained.
    pub fn release(&self, mut pooled: Pooled<T>) -> std::result::Result<(), Pooled<T>> {
        if pooled.pool_id != self.id {
            return Err(pooled);
        }

        let mut slots = self.slots.lock();
        if slots.drained || !slots.borrowed.remove(&pooled.slot) {
            return Err(pooled);
        }
        if let Some(item) = pooled.item.take() {
            slots.available.push_back((pooled.slot, item));
        }
        Ok(())
    }

    /// Remove every available instance and refuse all later releases.
    ///
    /// Borrowed instances are not waited for; dropping one afterwards closes
    /// it.
    pub fn drain(&self) -> Vec<T> {
        let mut slots = self.slots.lock();
        slots.drained = true;
        slots.available.drain(..).map(|(_, item)| item).collect()
    }

    pub fn is_drained(&self) -> bool {
        self.slots.lock().drained
    }

    pub fn stats(&self) -> PoolStats {
        let slots = self.slots.lock();
        PoolStats::new(self.capacity, slots.available.len(), slots.borrowed.len())
    }
}

impl<T: PoolResource> std::fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("id", &self.id)
            .field("stats", &self.stats())
            .finish()
    }
}
