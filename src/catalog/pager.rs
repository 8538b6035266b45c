//! Incremental, page-at-a-time catalog loading.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cache::{fetcher, Fetcher, QueryCache};
use crate::error::FetchError;
use crate::keys::CatalogQueryKey;
use crate::pokeapi::{CatalogEntry, Page, RemoteCatalog};
use crate::resource::IdResolver;

struct PendingPage {
  page_index: u32,
  rx: oneshot::Receiver<Result<Page, FetchError>>,
}

/// Accumulates catalog pages in order.
///
/// Page `i` covers offsets `[i * page_size, (i + 1) * page_size)`. Each page
/// is cached under its own key, so a new pager over the same cache replays
/// already-fetched pages without network traffic. At most one page fetch is
/// in flight at a time.
pub struct CatalogPager {
  remote: Arc<dyn RemoteCatalog>,
  cache: QueryCache<CatalogQueryKey, Page>,
  resolver: IdResolver,
  page_size: u32,
  pages: Vec<Page>,
  has_more: bool,
  pending: Option<PendingPage>,
  error: Option<FetchError>,
}

impl CatalogPager {
  pub fn new(
    remote: Arc<dyn RemoteCatalog>,
    cache: QueryCache<CatalogQueryKey, Page>,
    page_size: u32,
  ) -> Self {
    Self {
      remote,
      cache,
      resolver: IdResolver::pokemon(),
      page_size: page_size.max(1),
      pages: Vec::new(),
      has_more: true,
      pending: None,
      error: None,
    }
  }

  pub fn page_size(&self) -> u32 {
    self.page_size
  }

  /// Fetch one page through the cache.
  pub async fn fetch_page(&self, page_index: u32) -> Result<Page, FetchError> {
    let key = self.key(page_index);
    let result = self.cache.fetch_swr(&key, self.page_fetcher(page_index)).await?;
    Ok(result.data)
  }

  /// Request the next page.
  ///
  /// Returns `false` without doing anything if a page fetch is already in
  /// flight or the last page has been reached.
  pub fn load_more(&mut self) -> bool {
    if self.pending.is_some() || !self.has_more {
      return false;
    }

    let page_index = self.pages.len() as u32;
    let key = self.key(page_index);
    let fetch = self.page_fetcher(page_index);
    let cache = self.cache.clone();
    let (tx, rx) = oneshot::channel();

    debug!(page_index, page_size = self.page_size, "loading catalog page");
    tokio::spawn(async move {
      let result = cache.fetch_swr(&key, fetch).await.map(|r| r.data);
      let _ = tx.send(result);
    });

    self.pending = Some(PendingPage { page_index, rx });
    true
  }

  /// Pick up a finished page fetch. Returns `true` if state changed.
  pub fn poll(&mut self) -> bool {
    let Some(pending) = &mut self.pending else {
      return false;
    };
    let result = match pending.rx.try_recv() {
      Ok(result) => result,
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => {
        Err(FetchError::Aborted("page fetch task ended".to_string()))
      }
    };
    let page_index = pending.page_index;
    self.pending = None;
    self.apply(page_index, result);
    true
  }

  /// Wait for the in-flight page fetch to finish. Returns `false` if nothing
  /// was in flight.
  pub async fn settle(&mut self) -> bool {
    let Some(pending) = self.pending.take() else {
      return false;
    };
    let result = pending
      .rx
      .await
      .unwrap_or_else(|_| Err(FetchError::Aborted("page fetch task ended".to_string())));
    self.apply(pending.page_index, result);
    true
  }

  /// Load the next page and wait for it.
  ///
  /// Returns `Ok(false)` when there is nothing more to load.
  pub async fn load_next(&mut self) -> Result<bool, FetchError> {
    if !self.load_more() && self.pending.is_none() {
      return Ok(false);
    }
    self.settle().await;
    match &self.error {
      Some(err) => Err(err.clone()),
      None => Ok(true),
    }
  }

  /// Drop accumulated pages and start over from the first page.
  pub fn reset(&mut self) {
    self.pages.clear();
    self.has_more = true;
    self.pending = None;
    self.error = None;
  }

  pub fn has_more(&self) -> bool {
    self.has_more
  }

  pub fn is_fetching_next_page(&self) -> bool {
    self.pending.is_some()
  }

  /// Failure of the most recent page fetch. Earlier pages stay available.
  pub fn error(&self) -> Option<&FetchError> {
    self.error.as_ref()
  }

  pub fn pages(&self) -> &[Page] {
    &self.pages
  }

  /// All loaded entries in catalog order.
  ///
  /// An id repeated by a later page (the remote catalog shifted between
  /// requests) keeps its first position.
  pub fn entries(&self) -> Vec<CatalogEntry> {
    let mut seen = HashSet::new();
    self
      .pages
      .iter()
      .flat_map(|page| page.entries(&self.resolver))
      .filter(|entry| seen.insert(entry.id))
      .collect()
  }

  fn apply(&mut self, page_index: u32, result: Result<Page, FetchError>) {
    if page_index as usize != self.pages.len() {
      // Result of a fetch started before reset()
      return;
    }
    match result {
      Ok(page) => {
        self.has_more = !page.is_last(self.page_size);
        debug!(
          page_index,
          entries = page.results.len(),
          has_more = self.has_more,
          "catalog page loaded"
        );
        // An empty tail only ends paging; it is not a page of the catalog
        if !page.results.is_empty() {
          self.pages.push(page);
        }
        self.error = None;
      }
      Err(err) => {
        warn!(page_index, error = %err, "catalog page failed");
        self.error = Some(err);
      }
    }
  }

  fn key(&self, page_index: u32) -> CatalogQueryKey {
    CatalogQueryKey::CatalogPage {
      page_size: self.page_size,
      page_index,
    }
  }

  fn page_fetcher(&self, page_index: u32) -> Fetcher<Page> {
    let remote = Arc::clone(&self.remote);
    let limit = self.page_size;
    let offset = page_index.saturating_mul(limit);
    fetcher(move || {
      let remote = Arc::clone(&remote);
      async move { remote.list_entries(offset, limit).await }
    })
  }
}

impl std::fmt::Debug for CatalogPager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CatalogPager")
      .field("page_size", &self.page_size)
      .field("pages", &self.pages.len())
      .field("has_more", &self.has_more)
      .field("fetching", &self.pending.is_some())
      .field("error", &self.error)
      .finish()
  }
}
