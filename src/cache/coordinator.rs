//! Cross-cache policy: registration, tagged invalidation events, eviction.
//!
//! Mutations never reach into the caches they affect. They publish an event
//! (for example "favorites changed for id 25"), and listeners registered here
//! translate the event into the keys to invalidate. A new dependent view is
//! added by registering another listener, without touching the mutation.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::policy::CachePolicy;
use super::query_cache::QueryCache;
use super::traits::QueryKey;

/// Operations the coordinator needs from every registered cache.
trait ManagedCache<K>: Send + Sync {
  fn name(&self) -> &'static str;
  fn invalidate(&self, key: &K) -> bool;
  fn sweep(&self) -> usize;
  fn len(&self) -> usize;
}

impl<K, V> ManagedCache<K> for QueryCache<K, V>
where
  K: QueryKey,
  V: Clone + Send + Sync + 'static,
{
  fn name(&self) -> &'static str {
    QueryCache::name(self)
  }

  fn invalidate(&self, key: &K) -> bool {
    QueryCache::invalidate(self, key)
  }

  fn sweep(&self) -> usize {
    QueryCache::sweep(self)
  }

  fn len(&self) -> usize {
    QueryCache::len(self)
  }
}

type Listener<K, E> = Box<dyn Fn(&E) -> Vec<K> + Send + Sync>;

struct Inner<K, E> {
  caches: RwLock<Vec<Box<dyn ManagedCache<K>>>>,
  listeners: RwLock<Vec<Listener<K, E>>>,
}

/// Owns every query cache of the application and routes invalidation events.
///
/// `K` is the application's key type, `E` its mutation event type.
pub struct CacheCoordinator<K, E> {
  inner: Arc<Inner<K, E>>,
}

impl<K, E> Clone for CacheCoordinator<K, E> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<K, E> Default for CacheCoordinator<K, E>
where
  K: QueryKey,
  E: std::fmt::Debug + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<K, E> CacheCoordinator<K, E>
where
  K: QueryKey,
  E: std::fmt::Debug + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Inner {
        caches: RwLock::new(Vec::new()),
        listeners: RwLock::new(Vec::new()),
      }),
    }
  }

  /// Create a cache for one query category and place it under coordination.
  pub fn register<V>(&self, name: &'static str, policy: CachePolicy) -> QueryCache<K, V>
  where
    V: Clone + Send + Sync + 'static,
  {
    let cache = QueryCache::new(name, policy);
    self
      .inner
      .caches
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .push(Box::new(cache.clone()));
    debug!(cache = name, ?policy, "cache registered");
    cache
  }

  /// Subscribe a dependent view to mutation events.
  ///
  /// The listener returns the keys an event makes stale.
  pub fn on_event<F>(&self, listener: F)
  where
    F: Fn(&E) -> Vec<K> + Send + Sync + 'static,
  {
    self
      .inner
      .listeners
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .push(Box::new(listener));
  }

  /// Deliver an event to every listener and invalidate the keys they name.
  ///
  /// Returns the number of cache entries invalidated.
  pub fn publish(&self, event: &E) -> usize {
    let keys: Vec<K> = self
      .inner
      .listeners
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .iter()
      .flat_map(|listener| listener(event))
      .collect();

    let invalidated = keys.iter().map(|key| self.invalidate(key)).sum();
    debug!(?event, keys = keys.len(), invalidated, "event published");
    invalidated
  }

  /// Invalidate `key` in whichever registered cache holds it.
  ///
  /// Returns the number of entries invalidated (0 when nothing was cached).
  pub fn invalidate(&self, key: &K) -> usize {
    self
      .inner
      .caches
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .iter()
      .filter(|cache| cache.invalidate(key))
      .count()
  }

  /// Evict idle entries from every cache.
  pub fn sweep(&self) -> usize {
    let caches = self
      .inner
      .caches
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut evicted = 0;
    for cache in caches.iter() {
      let n = cache.sweep();
      if n > 0 {
        debug!(cache = cache.name(), evicted = n, remaining = cache.len(), "swept");
      }
      evicted += n;
    }
    evicted
  }

  /// Total entries across all caches.
  pub fn entry_count(&self) -> usize {
    self
      .inner
      .caches
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .iter()
      .map(|cache| cache.len())
      .sum()
  }

  /// Run [`sweep`](Self::sweep) every `period` until the handle is aborted.
  pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
    let coordinator = self.clone();
    info!(?period, "cache sweeper started");
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(period);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        coordinator.sweep();
      }
    })
  }
}
