//! Generic in-memory caching layer.
//!
//! This module knows nothing about work items. It provides:
//! - Per-entry TTL with lazy expiry (no background sweep)
//! - Single-flight loading: concurrent misses for one key share a single fetch
//! - Failed loads are never cached

mod entry;
mod layer;
mod traits;

pub use entry::CacheEntry;
pub use layer::TtlCache;
pub use traits::{CacheResult, CacheSource};
