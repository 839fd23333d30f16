//! Redis backend for redpool
//!
//! Opens multiplexed async connections with the `redis` crate and checks
//! them with `PING`. Endpoints may be full `redis://` URLs or bare
//! `host[:port]` / `[ipv6]:port` addresses.

mod driver;
#[cfg(test)]
mod driver_tests;

pub use driver::*;
