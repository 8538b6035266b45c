//! Generic query caching layer.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Keys every query by a hashed composite key
//! - Collapses concurrent identical requests into one in-flight fetch
//! - Applies per-category staleness and eviction windows
//! - Routes mutation events to the queries they invalidate

mod coordinator;
mod policy;
mod query_cache;
mod traits;

pub use coordinator::CacheCoordinator;
pub use policy::CachePolicy;
pub use query_cache::{fetcher, BoxFetch, Fetcher, QueryCache, Subscription};
pub use traits::{CacheResult, CacheSource, QueryKey, QuerySnapshot, QueryStatus};
