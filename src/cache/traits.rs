//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

use crate::error::FetchError;

/// Identifies a query in the cache.
///
/// Implementors map an operation name plus its parameters to a stable hash.
/// Two keys with equal hashes share one cache entry and one in-flight fetch.
pub trait QueryKey: Clone + Send + Sync + 'static {
  /// Stable, fixed-length identifier for this query
  fn cache_hash(&self) -> String;

  /// Human-readable description used in logs
  fn description(&self) -> String;
}

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// No value yet; the first fetch is running or has not been started
  Pending,
  /// Value within its staleness window
  Fresh,
  /// Value past its staleness window or explicitly invalidated
  Stale,
  /// Last fetch failed
  Errored,
}

/// Point-in-time view of one cache entry, as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
  /// Last successfully fetched value, kept across later failures
  pub data: Option<T>,
  /// Error of the most recent fetch, cleared on success
  pub error: Option<FetchError>,
  pub status: QueryStatus,
  /// A fetch for this key is in flight
  pub is_fetching: bool,
  /// When `data` was fetched
  pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> QuerySnapshot<T> {
  pub fn pending() -> Self {
    Self {
      data: None,
      error: None,
      status: QueryStatus::Pending,
      is_fetching: false,
      fetched_at: None,
    }
  }

  /// First load in progress: nothing to show yet.
  pub fn is_loading(&self) -> bool {
    self.data.is_none() && self.error.is_none() && self.status == QueryStatus::Pending
  }

  pub fn is_success(&self) -> bool {
    self.data.is_some() && self.error.is_none()
  }

  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.error.as_ref()
  }
}

impl<T> Default for QuerySnapshot<T> {
  fn default() -> Self {
    Self::pending()
  }
}

/// Indicates where a value returned by a read came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched by this read (or a deduplicated concurrent read)
  Network,
  /// Served from cache within its staleness window
  CacheFresh,
  /// Served from cache past its staleness window; a refetch was started
  CacheStale,
}

/// Value returned by a cache read, including metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
  pub fetched_at: DateTime<Utc>,
}
