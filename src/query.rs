//! Subscription handle for UI consumers.
//!
//! Inspired by TanStack Query, a `Query<K, V>` observes one cache entry and
//! exposes `{data, is_loading, error}`. Creating a query does nothing; the
//! first `fetch()` subscribes, which starts a fetch when the entry is missing,
//! stale or errored. Identical queries share the entry and its in-flight fetch.
//!
//! # Example
//!
//! ```ignore
//! let mut query = Query::new(details.clone(), CatalogQueryKey::Detail { name }, fetch_detail);
//!
//! // Start fetching
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use std::future::Future;

use crate::cache::{fetcher, Fetcher, QueryCache, QueryKey, QuerySnapshot, Subscription};
use crate::error::FetchError;

/// Render-oriented state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// First fetch in progress, no data yet
  Loading,
  /// Data available (possibly stale while a refetch runs)
  Success(T),
  /// Fetch failed and no earlier data exists. A retry in flight reports
  /// `Loading` instead.
  Error(FetchError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }
}

/// The `{data, is_loading, error}` shape delivered to UI consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
  pub data: Option<T>,
  pub is_loading: bool,
  /// A refetch is running, with or without data
  pub is_fetching: bool,
  pub error: Option<FetchError>,
}

/// Observing handle over one cache entry.
///
/// While subscribed, the entry counts an active subscriber and is exempt from
/// eviction. Dropping the query (or calling [`unsubscribe`](Self::unsubscribe))
/// tears down observation immediately; an in-flight fetch still completes into
/// the cache.
pub struct Query<K, V>
where
  K: QueryKey,
  V: Clone + Send + Sync + 'static,
{
  cache: QueryCache<K, V>,
  key: K,
  fetcher: Fetcher<V>,
  subscription: Option<Subscription<K, V>>,
  snapshot: QuerySnapshot<V>,
}

impl<K, V> Query<K, V>
where
  K: QueryKey,
  V: Clone + Send + Sync + 'static,
{
  /// Create a query for `key`, fetched by `fetch_fn` when needed.
  pub fn new<F, Fut>(cache: QueryCache<K, V>, key: K, fetch_fn: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
  {
    Self::with_fetcher(cache, key, fetcher(fetch_fn))
  }

  pub fn with_fetcher(cache: QueryCache<K, V>, key: K, fetcher: Fetcher<V>) -> Self {
    Self {
      cache,
      key,
      fetcher,
      subscription: None,
      snapshot: QuerySnapshot::pending(),
    }
  }

  pub fn key(&self) -> &K {
    &self.key
  }

  pub fn is_subscribed(&self) -> bool {
    self.subscription.is_some()
  }

  /// Subscribe and fetch if the cached entry is missing, stale or errored.
  ///
  /// When already subscribed this only re-issues a failed fetch, see
  /// [`retry`](Self::retry).
  pub fn fetch(&mut self) {
    if self.subscription.is_some() {
      self.retry();
      return;
    }
    let mut subscription = self.cache.subscribe(&self.key, self.fetcher.clone());
    self.snapshot = subscription.latest();
    self.subscription = Some(subscription);
  }

  /// Re-issue the fetch if the entry's last fetch failed and none is running.
  ///
  /// Returns `true` if a fetch was started.
  pub fn retry(&mut self) -> bool {
    let current = self.cache.snapshot(&self.key);
    if current.error.is_none() || current.is_fetching {
      return false;
    }
    if self.subscription.is_none() {
      // Subscribing refetches an errored entry
      self.fetch();
      return true;
    }
    drop(self.cache.refetch(&self.key, self.fetcher.clone()));
    self.poll();
    true
  }

  /// Force a refetch even when the cached value is fresh.
  pub fn refetch(&mut self) {
    self.fetch();
    drop(self.cache.refetch(&self.key, self.fetcher.clone()));
    self.poll();
  }

  /// Stop observing. The cached entry starts its eviction window.
  pub fn unsubscribe(&mut self) {
    self.subscription = None;
  }

  /// Pick up a newly published snapshot.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick
  /// handler.
  pub fn poll(&mut self) -> bool {
    match &mut self.subscription {
      Some(subscription) if subscription.has_changed() => {
        self.snapshot = subscription.latest();
        true
      }
      _ => false,
    }
  }

  /// Wait for the next state change. Returns `false` when not subscribed.
  pub async fn changed(&mut self) -> bool {
    let Some(subscription) = &mut self.subscription else {
      return false;
    };
    match subscription.changed().await {
      Ok(snapshot) => {
        self.snapshot = snapshot;
        true
      }
      Err(_) => false,
    }
  }

  /// Wait until no fetch is in flight, then return the result.
  pub async fn settled(&mut self) -> QueryResult<V> {
    self.fetch();
    self.poll();
    while self.snapshot.is_fetching || self.snapshot.is_loading() {
      if !self.changed().await {
        break;
      }
    }
    self.result()
  }

  pub fn snapshot(&self) -> &QuerySnapshot<V> {
    &self.snapshot
  }

  pub fn state(&self) -> QueryState<&V> {
    if self.subscription.is_none() && self.snapshot.data.is_none() {
      return QueryState::Idle;
    }
    match (&self.snapshot.data, &self.snapshot.error) {
      (Some(data), _) => QueryState::Success(data),
      (None, Some(_)) if self.snapshot.is_fetching => QueryState::Loading,
      (None, Some(err)) => QueryState::Error(err.clone()),
      (None, None) => QueryState::Loading,
    }
  }

  pub fn result(&self) -> QueryResult<V> {
    QueryResult {
      data: self.snapshot.data.clone(),
      is_loading: self.snapshot.data.is_none()
        && (self.snapshot.error.is_none() || self.snapshot.is_fetching),
      is_fetching: self.snapshot.is_fetching,
      error: self.snapshot.error.clone(),
    }
  }

  pub fn data(&self) -> Option<&V> {
    self.snapshot.data.as_ref()
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.snapshot.error.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.state().is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state().is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state().is_error()
  }

  /// Check if the cached data is stale (older than the category's stale time
  /// or invalidated).
  pub fn is_stale(&self) -> bool {
    self.cache.is_stale(&self.key)
  }
}

impl<K, V> std::fmt::Debug for Query<K, V>
where
  K: QueryKey + std::fmt::Debug,
  V: Clone + Send + Sync + std::fmt::Debug + 'static,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("snapshot", &self.snapshot)
      .field("subscribed", &self.subscription.is_some())
      .finish_non_exhaustive()
  }
}
