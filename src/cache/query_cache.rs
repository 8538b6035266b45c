//! Typed, in-memory query cache.
//!
//! One `QueryCache` holds every entry of one query category (all catalog
//! pages, all detail records, ...). Entries are keyed by [`QueryKey`] hash and
//! follow the lifecycle pending → fresh → stale, with eviction once an entry
//! has had no subscribers for the category's `gc_time`.
//!
//! Fetches run as spawned tasks that write their own result back into the
//! entry, so a result is cached even when every caller stopped waiting for it.
//! All callers that arrive while a fetch is in flight join the same shared
//! future.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::policy::CachePolicy;
use super::traits::{CacheResult, CacheSource, QueryKey, QuerySnapshot, QueryStatus};
use crate::error::FetchError;

/// A boxed future resolving to a fetched value
pub type BoxFetch<V> = BoxFuture<'static, Result<V, FetchError>>;

/// A factory producing a fresh fetch future per invocation
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFetch<V> + Send + Sync>;

type SharedFetch<V> = Shared<BoxFetch<V>>;

/// Wrap an async closure as a [`Fetcher`].
pub fn fetcher<V, F, Fut>(f: F) -> Fetcher<V>
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
{
  Arc::new(move || f().boxed())
}

struct Entry<K, V> {
  key: K,
  value: Option<V>,
  fetched_at: Option<Instant>,
  fetched_at_utc: Option<DateTime<Utc>>,
  error: Option<FetchError>,
  invalidated: bool,
  in_flight: Option<SharedFetch<V>>,
  /// Bumped on every fetch start; a completion with an older value is dropped
  generation: u64,
  /// Most recent fetcher, reused for invalidation-triggered refetches
  fetcher: Option<Fetcher<V>>,
  subscribers: usize,
  idle_since: Instant,
  tx: watch::Sender<QuerySnapshot<V>>,
}

impl<K, V: Clone> Entry<K, V> {
  fn new(key: K, now: Instant) -> Self {
    let (tx, _rx) = watch::channel(QuerySnapshot::pending());
    Self {
      key,
      value: None,
      fetched_at: None,
      fetched_at_utc: None,
      error: None,
      invalidated: false,
      in_flight: None,
      generation: 0,
      fetcher: None,
      subscribers: 0,
      idle_since: now,
      tx,
    }
  }

  fn is_stale(&self, policy: &CachePolicy, now: Instant) -> bool {
    self.invalidated
      || self
        .fetched_at
        .map(|at| now.saturating_duration_since(at) >= policy.stale_time)
        .unwrap_or(true)
  }

  fn snapshot(&self, policy: &CachePolicy, now: Instant) -> QuerySnapshot<V> {
    let status = if self.error.is_some() {
      QueryStatus::Errored
    } else if self.value.is_none() {
      QueryStatus::Pending
    } else if self.is_stale(policy, now) {
      QueryStatus::Stale
    } else {
      QueryStatus::Fresh
    };

    QuerySnapshot {
      data: self.value.clone(),
      error: self.error.clone(),
      status,
      is_fetching: self.in_flight.is_some(),
      fetched_at: self.fetched_at_utc,
    }
  }

  fn publish(&self, policy: &CachePolicy, now: Instant) {
    self.tx.send_replace(self.snapshot(policy, now));
  }
}

struct Inner<K, V> {
  name: &'static str,
  policy: CachePolicy,
  entries: Mutex<HashMap<String, Entry<K, V>>>,
}

impl<K, V> Inner<K, V> {
  fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<K, V>>> {
    // Entries stay consistent across a panicking holder: every mutation is a
    // field assignment.
    self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

/// Keyed cache for one category of query results.
pub struct QueryCache<K, V> {
  inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for QueryCache<K, V> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<K, V> QueryCache<K, V>
where
  K: QueryKey,
  V: Clone + Send + Sync + 'static,
{
  /// Create an empty cache. `name` labels the category in logs.
  pub fn new(name: &'static str, policy: CachePolicy) -> Self {
    Self {
      inner: Arc::new(Inner {
        name,
        policy,
        entries: Mutex::new(HashMap::new()),
      }),
    }
  }

  pub fn name(&self) -> &'static str {
    self.inner.name
  }

  pub fn policy(&self) -> CachePolicy {
    self.inner.policy
  }

  /// Read-through fetch.
  ///
  /// 1. Fresh value cached - return it without fetching
  /// 2. Fetch for this key in flight - join it
  /// 3. Otherwise (missing, stale, invalidated or errored) - fetch and await
  pub async fn fetch(&self, key: &K, fetcher: Fetcher<V>) -> Result<CacheResult<V>, FetchError> {
    self.sweep();
    let pending = {
      let mut entries = self.inner.lock();
      let now = Instant::now();
      let hash = key.cache_hash();
      let entry = entries
        .entry(hash.clone())
        .or_insert_with(|| Entry::new(key.clone(), now));
      entry.fetcher = Some(Arc::clone(&fetcher));

      if entry.error.is_none() && !entry.is_stale(&self.inner.policy, now) {
        if let Some(value) = &entry.value {
          trace!(cache = self.inner.name, key = %key.description(), "cache hit");
          return Ok(CacheResult {
            data: value.clone(),
            source: CacheSource::CacheFresh,
            fetched_at: entry.fetched_at_utc.unwrap_or_else(Utc::now),
          });
        }
      }
      self.join_or_start(&hash, entry, fetcher)
    };

    let data = pending.await?;
    Ok(CacheResult {
      data,
      source: CacheSource::Network,
      fetched_at: Utc::now(),
    })
  }

  /// Stale-while-revalidate fetch.
  ///
  /// Like [`fetch`](Self::fetch), except a stale value is returned immediately
  /// while a background refetch is started. Only a missing or errored entry
  /// makes the caller wait.
  pub async fn fetch_swr(
    &self,
    key: &K,
    fetcher: Fetcher<V>,
  ) -> Result<CacheResult<V>, FetchError> {
    self.sweep();
    let pending = {
      let mut entries = self.inner.lock();
      let now = Instant::now();
      let hash = key.cache_hash();
      let entry = entries
        .entry(hash.clone())
        .or_insert_with(|| Entry::new(key.clone(), now));
      entry.fetcher = Some(Arc::clone(&fetcher));

      let stale = entry.is_stale(&self.inner.policy, now);
      match entry.value.clone() {
        Some(value) if entry.error.is_none() => {
          let fetched_at = entry.fetched_at_utc.unwrap_or_else(Utc::now);
          if !stale {
            return Ok(CacheResult {
              data: value,
              source: CacheSource::CacheFresh,
              fetched_at,
            });
          }
          // Background refresh; the shared future keeps running without us.
          drop(self.join_or_start(&hash, entry, fetcher));
          return Ok(CacheResult {
            data: value,
            source: CacheSource::CacheStale,
            fetched_at,
          });
        }
        _ => self.join_or_start(&hash, entry, fetcher),
      }
    };

    let data = pending.await?;
    Ok(CacheResult {
      data,
      source: CacheSource::Network,
      fetched_at: Utc::now(),
    })
  }

  /// Force a fetch regardless of freshness, joining one already in flight.
  pub fn refetch(
    &self,
    key: &K,
    fetcher: Fetcher<V>,
  ) -> impl Future<Output = Result<V, FetchError>> + Send + 'static {
    let mut entries = self.inner.lock();
    let hash = key.cache_hash();
    let entry = entries
      .entry(hash.clone())
      .or_insert_with(|| Entry::new(key.clone(), Instant::now()));
    entry.fetcher = Some(Arc::clone(&fetcher));
    self.join_or_start(&hash, entry, fetcher)
  }

  /// Mark an entry stale regardless of age.
  ///
  /// A fetch already in flight is detached: its callers still receive its
  /// result, but the result is not written back. Entries with active
  /// subscribers are refetched immediately. Returns whether the key existed.
  pub fn invalidate(&self, key: &K) -> bool {
    let mut entries = self.inner.lock();
    let hash = key.cache_hash();
    let Some(entry) = entries.get_mut(&hash) else {
      return false;
    };

    debug!(cache = self.inner.name, key = %key.description(), "invalidated");
    entry.invalidated = true;
    if entry.in_flight.take().is_some() {
      entry.generation += 1;
    }

    if entry.subscribers > 0 {
      if let Some(fetcher) = entry.fetcher.clone() {
        drop(self.join_or_start(&hash, entry, fetcher));
        return true;
      }
    }
    entry.publish(&self.inner.policy, Instant::now());
    true
  }

  /// Current snapshot of an entry (pending if absent).
  pub fn snapshot(&self, key: &K) -> QuerySnapshot<V> {
    let entries = self.inner.lock();
    entries
      .get(&key.cache_hash())
      .map(|e| e.snapshot(&self.inner.policy, Instant::now()))
      .unwrap_or_default()
  }

  /// Cached value, fresh or stale.
  pub fn get_data(&self, key: &K) -> Option<V> {
    self
      .inner
      .lock()
      .get(&key.cache_hash())
      .and_then(|e| e.value.clone())
  }

  pub fn is_stale(&self, key: &K) -> bool {
    self
      .inner
      .lock()
      .get(&key.cache_hash())
      .map(|e| e.is_stale(&self.inner.policy, Instant::now()))
      .unwrap_or(true)
  }

  pub fn contains(&self, key: &K) -> bool {
    self.inner.lock().contains_key(&key.cache_hash())
  }

  pub fn subscriber_count(&self, key: &K) -> usize {
    self
      .inner
      .lock()
      .get(&key.cache_hash())
      .map(|e| e.subscribers)
      .unwrap_or(0)
  }

  pub fn len(&self) -> usize {
    self.inner.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Register an active subscriber.
  ///
  /// Starts a fetch when the entry has no value, is stale, or last failed.
  /// The returned guard keeps the entry from eviction until dropped.
  pub fn subscribe(&self, key: &K, fetcher: Fetcher<V>) -> Subscription<K, V> {
    self.sweep();
    let mut entries = self.inner.lock();
    let now = Instant::now();
    let hash = key.cache_hash();
    let entry = entries
      .entry(hash.clone())
      .or_insert_with(|| Entry::new(key.clone(), now));
    entry.subscribers += 1;
    entry.fetcher = Some(Arc::clone(&fetcher));

    let needs_fetch = entry.value.is_none()
      || entry.error.is_some()
      || entry.is_stale(&self.inner.policy, now);
    if needs_fetch && entry.in_flight.is_none() {
      drop(self.join_or_start(&hash, entry, fetcher));
    }

    let rx = entry.tx.subscribe();
    Subscription {
      cache: self.clone(),
      hash,
      rx,
    }
  }

  fn unsubscribe(&self, hash: &str) {
    let mut entries = self.inner.lock();
    if let Some(entry) = entries.get_mut(hash) {
      entry.subscribers = entry.subscribers.saturating_sub(1);
      if entry.subscribers == 0 {
        entry.idle_since = Instant::now();
      }
    }
  }

  /// Evict entries that have been idle for longer than `gc_time`.
  ///
  /// Entries with subscribers or an in-flight fetch are never evicted.
  pub fn sweep(&self) -> usize {
    let mut entries = self.inner.lock();
    let now = Instant::now();
    let gc_time = self.inner.policy.gc_time;
    let before = entries.len();
    entries.retain(|_, e| {
      e.subscribers > 0
        || e.in_flight.is_some()
        || now.saturating_duration_since(e.idle_since) < gc_time
    });
    let evicted = before - entries.len();
    if evicted > 0 {
      debug!(cache = self.inner.name, evicted, "evicted idle entries");
    }
    evicted
  }

  /// Join the in-flight fetch for `entry`, or spawn a new one.
  fn join_or_start(&self, hash: &str, entry: &mut Entry<K, V>, fetcher: Fetcher<V>) -> SharedFetch<V> {
    if let Some(in_flight) = &entry.in_flight {
      debug!(cache = self.inner.name, key = %entry.key.description(), "joined in-flight fetch");
      return in_flight.clone();
    }

    entry.generation += 1;
    let generation = entry.generation;
    debug!(cache = self.inner.name, key = %entry.key.description(), "fetch started");

    let future = fetcher();
    let inner = Arc::clone(&self.inner);
    let task_hash = hash.to_string();
    let handle = tokio::spawn(async move {
      let result = AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(FetchError::Aborted(panic_message(&*panic))));
      complete(&inner, &task_hash, generation, &result);
      result
    });

    // A cancelled task never reached complete(); clear the entry here instead.
    let inner = Arc::clone(&self.inner);
    let task_hash = hash.to_string();
    let shared = async move {
      match handle.await {
        Ok(result) => result,
        Err(err) => {
          let result = Err(FetchError::Aborted(err.to_string()));
          complete(&inner, &task_hash, generation, &result);
          result
        }
      }
    }
    .boxed()
    .shared();

    entry.in_flight = Some(shared.clone());
    entry.publish(&self.inner.policy, Instant::now());
    shared
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  let detail = panic
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| panic.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown panic".to_string());
  format!("fetch panicked: {detail}")
}

/// Write a finished fetch back into its entry.
fn complete<K: QueryKey, V: Clone>(
  inner: &Inner<K, V>,
  hash: &str,
  generation: u64,
  result: &Result<V, FetchError>,
) {
  let mut entries = inner.lock();
  let Some(entry) = entries.get_mut(hash) else {
    return;
  };
  if entry.generation != generation {
    debug!(cache = inner.name, key = %entry.key.description(), "discarded detached fetch result");
    return;
  }

  let now = Instant::now();
  entry.in_flight = None;
  match result {
    Ok(value) => {
      debug!(cache = inner.name, key = %entry.key.description(), "fetch succeeded");
      entry.value = Some(value.clone());
      entry.fetched_at = Some(now);
      entry.fetched_at_utc = Some(Utc::now());
      entry.error = None;
      entry.invalidated = false;
    }
    Err(err) => {
      debug!(cache = inner.name, key = %entry.key.description(), error = %err, "fetch failed");
      entry.error = Some(err.clone());
    }
  }
  if entry.subscribers == 0 {
    entry.idle_since = now;
  }
  entry.publish(&inner.policy, now);
}

/// Active observation of one cache entry.
///
/// Dropping the subscription stops observation only; a fetch in flight still
/// completes and is cached.
pub struct Subscription<K, V>
where
  K: QueryKey,
  V: Clone + Send + Sync + 'static,
{
  cache: QueryCache<K, V>,
  hash: String,
  rx: watch::Receiver<QuerySnapshot<V>>,
}

impl<K, V> Subscription<K, V>
where
  K: QueryKey,
  V: Clone + Send + Sync + 'static,
{
  /// Latest published snapshot, marking it seen.
  pub fn latest(&mut self) -> QuerySnapshot<V> {
    self.rx.borrow_and_update().clone()
  }

  /// Whether a snapshot was published since the last [`latest`](Self::latest).
  pub fn has_changed(&self) -> bool {
    self.rx.has_changed().unwrap_or(false)
  }

  /// Wait for the next published snapshot.
  pub async fn changed(&mut self) -> Result<QuerySnapshot<V>, FetchError> {
    self
      .rx
      .changed()
      .await
      .map_err(|_| FetchError::Aborted("cache entry dropped".to_string()))?;
    Ok(self.latest())
  }
}

impl<K, V> Drop for Subscription<K, V>
where
  K: QueryKey,
  V: Clone + Send + Sync + 'static,
{
  fn drop(&mut self) {
    self.cache.unsubscribe(&self.hash);
  }
}
