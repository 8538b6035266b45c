//! Catalog list state: paged browsing plus search over the full index.

use crate::keys::CatalogQueryKey;
use crate::pokeapi::CatalogEntry;
use crate::query::Query;

use super::index::{normalize_query, search, FullIndex, SearchView};
use super::pager::CatalogPager;

/// Drives the catalog list for one screen.
///
/// The full index is requested the first time the query becomes non-empty
/// and stays subscribed afterwards, so clearing and retyping a query does not
/// refetch it unless the last attempt failed. Paging is suspended while a
/// query is set.
pub struct CatalogBrowser {
  pager: CatalogPager,
  index: FullIndex,
  index_query: Option<Query<CatalogQueryKey, Vec<CatalogEntry>>>,
  query: String,
}

impl CatalogBrowser {
  pub fn new(pager: CatalogPager, index: FullIndex) -> Self {
    Self {
      pager,
      index,
      index_query: None,
      query: String::new(),
    }
  }

  pub fn query(&self) -> &str {
    &self.query
  }

  pub fn is_searching(&self) -> bool {
    !normalize_query(&self.query).is_empty()
  }

  pub fn set_query(&mut self, query: impl Into<String>) {
    self.query = query.into();
    if self.is_searching() {
      self
        .index_query
        .get_or_insert_with(|| self.index.query())
        .fetch();
    }
  }

  /// Re-issue whatever failed for the current view: the index while
  /// searching, the next page otherwise. Returns `true` if a fetch started.
  pub fn retry(&mut self) -> bool {
    if self.is_searching() {
      return self.index_query.as_mut().is_some_and(|q| q.retry());
    }
    self.pager.error().is_some() && self.pager.load_more()
  }

  /// Request the next catalog page. A no-op while searching.
  pub fn load_more(&mut self) -> bool {
    if self.is_searching() {
      return false;
    }
    self.pager.load_more()
  }

  /// Pick up finished fetches. Returns `true` if the view may have changed.
  pub fn poll(&mut self) -> bool {
    let paged = self.pager.poll();
    let indexed = self.index_query.as_mut().is_some_and(|q| q.poll());
    paged || indexed
  }

  /// Wait for the index when a search is active.
  pub async fn settle_index(&mut self) {
    if let (true, Some(query)) = (self.is_searching(), self.index_query.as_mut()) {
      query.settled().await;
    }
  }

  pub fn view(&self) -> SearchView {
    let paged = self.pager.entries();
    search(
      &self.query,
      &paged,
      self.index_query.as_ref().map(|q| q.snapshot()),
    )
  }

  pub fn pager(&self) -> &CatalogPager {
    &self.pager
  }

  pub fn pager_mut(&mut self) -> &mut CatalogPager {
    &mut self.pager
  }

  pub fn has_more(&self) -> bool {
    !self.is_searching() && self.pager.has_more()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CachePolicy, QueryCache};
  use crate::error::FetchError;
  use crate::testing::{MockOp, MockRemoteCatalog};
  use std::sync::Arc;

  fn browser(mock: &Arc<MockRemoteCatalog>) -> CatalogBrowser {
    let pager = CatalogPager::new(
      mock.clone(),
      QueryCache::new("catalog_page", CachePolicy::always_stale()),
      10,
    );
    let index = FullIndex::new(
      mock.clone(),
      QueryCache::new("full_index", CachePolicy::always_stale()),
      2000,
    );
    CatalogBrowser::new(pager, index)
  }

  #[tokio::test]
  async fn test_empty_query_never_fetches_index() {
    let mock = Arc::new(MockRemoteCatalog::with_catalog(25));
    let mut browser = browser(&mock);

    browser.pager_mut().load_next().await.unwrap();
    browser.set_query("   ");
    browser.settle_index().await;

    assert_eq!(browser.view().entries().len(), 10);
    assert_eq!(mock.call_count(MockOp::List), 1);
  }

  #[tokio::test]
  async fn test_search_over_full_index() {
    let mock = Arc::new(MockRemoteCatalog::with_catalog(25));
    let mut browser = browser(&mock);
    browser.pager_mut().load_next().await.unwrap();

    browser.set_query("MON-2");
    assert_eq!(browser.view(), SearchView::LoadingIndex);
    browser.settle_index().await;

    // mon-2 and mon-20..=25, beyond the first page
    let ids: Vec<u32> = browser.view().entries().iter().map(|e| e.id).collect();
    assert_eq!(ids, [2, 20, 21, 22, 23, 24, 25]);

    browser.set_query("nothing");
    assert_eq!(browser.view(), SearchView::Matches(vec![]));
  }

  #[tokio::test]
  async fn test_retyping_retries_failed_index() {
    let mock = Arc::new(MockRemoteCatalog::with_catalog(12));
    mock.fail_next(MockOp::List, FetchError::Network("offline".into()));
    let mut browser = browser(&mock);

    browser.set_query("pika");
    browser.settle_index().await;
    assert_eq!(
      browser.view(),
      SearchView::IndexFailed(FetchError::Network("offline".into()))
    );

    browser.set_query("");
    browser.set_query("mon-2");
    assert_eq!(browser.view(), SearchView::LoadingIndex);
    browser.settle_index().await;

    let ids: Vec<u32> = browser.view().entries().iter().map(|e| e.id).collect();
    assert_eq!(ids, [2]);
    assert_eq!(mock.call_count(MockOp::List), 2);
  }

  #[tokio::test]
  async fn test_retry_reissues_failed_stage() {
    let mock = Arc::new(MockRemoteCatalog::with_catalog(12));
    let mut browser = browser(&mock);
    assert!(!browser.retry());

    mock.fail_next(MockOp::List, FetchError::Network("offline".into()));
    assert!(browser.pager_mut().load_next().await.is_err());
    assert!(browser.retry());
    browser.pager_mut().settle().await;
    assert_eq!(browser.view().entries().len(), 10);

    mock.fail_next(MockOp::List, FetchError::Network("offline".into()));
    browser.set_query("mon");
    browser.settle_index().await;
    assert!(matches!(browser.view(), SearchView::IndexFailed(_)));
    assert!(browser.retry());
    browser.settle_index().await;
    assert_eq!(browser.view().entries().len(), 12);
    assert!(!browser.retry());
  }

  #[tokio::test]
  async fn test_load_more_disabled_while_searching() {
    let mock = Arc::new(MockRemoteCatalog::with_catalog(25));
    let mut browser = browser(&mock);

    browser.set_query("mon");
    assert!(!browser.load_more());
    assert!(!browser.has_more());

    browser.set_query("");
    assert!(browser.load_more());
  }
}
