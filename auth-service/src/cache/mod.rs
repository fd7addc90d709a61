//! # Tiered Cache Layer
//!
//! Implements the three-tier cache described in §4.4: [`l1`] is the
//! in-process tier, [`tiered`] orchestrates it against the L2 durable KV
//! (`shared::redis_client::RedisClient`) and an L3 authoritative loader
//! supplied by the caller per cached kind.
//!
//! | Module   | Tier | Durable across restarts | Shared across instances |
//! |----------|------|--------------------------|--------------------------|
//! | `l1`     | L1   | No                       | No                       |
//! | (redis)  | L2   | Yes                      | Yes                      |
//! | (loader) | L3   | Yes (relational store)   | Yes                      |

pub mod l1;
pub mod tiered;

pub use l1::L1Cache;
pub use tiered::{CacheLayer, TieredCache};
