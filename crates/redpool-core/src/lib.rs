//! redpool core - shared abstractions for the connection pool
//!
//! This crate provides the types every other redpool crate depends on:
//!
//! - `Backend` - capability trait for opening, probing and closing one
//!   physical connection to an endpoint
//! - `PoolConfig` / `PoolSettings` - pool configuration, typed and string-typed
//! - `PoolError` - the error taxonomy shared by the pool and its drivers

mod backend;
mod config;
mod error;

pub use backend::*;
pub use config::*;
pub use error::*;
