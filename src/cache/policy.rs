//! Staleness and eviction windows per query category.

use std::time::Duration;

/// Timing policy applied to every entry of one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
  /// How long a fetched value counts as fresh
  pub stale_time: Duration,
  /// How long an entry with no subscribers survives before eviction
  pub gc_time: Duration,
}

impl CachePolicy {
  pub const DEFAULT_GC: Duration = Duration::from_secs(5 * 60);

  pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
    Self {
      stale_time,
      gc_time,
    }
  }

  /// Always revalidate on read.
  pub fn always_stale() -> Self {
    Self::new(Duration::ZERO, Self::DEFAULT_GC)
  }
}

impl Default for CachePolicy {
  fn default() -> Self {
    Self::always_stale()
  }
}
