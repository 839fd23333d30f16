//! Bounded pool of pre-created resources
//!
//! A `ResourcePool` is filled once by `populate` and never grows. Borrowers
//! take instances out by value and hand them back with `release`, or simply
//! drop them; `drain` empties the pool for teardown.
//!
//! # Example
//!
//! ```ignore
//! use redpool_connection::pool::ResourcePool;
//!
//! let pool = ResourcePool::populate(4, || make_resource()).await?;
//! if let Some(resource) = pool.borrow() {
//!     // Use resource...
//!     pool.release(resource).ok();
//! }
//! ```

mod pool;
mod stats;


pub use pool::{PoolResource, Pooled, ResourcePool};
pub use stats::PoolStats;
