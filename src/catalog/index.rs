//! Full catalog index and in-memory name search.

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{fetcher, Fetcher, QueryCache, QuerySnapshot};
use crate::error::FetchError;
use crate::keys::CatalogQueryKey;
use crate::pokeapi::{types::to_entries, CatalogEntry, RemoteCatalog};
use crate::query::Query;
use crate::resource::IdResolver;

/// Fetches the whole catalog in a single request for search.
///
/// The index is expected to change rarely, so its cache category carries a
/// long freshness window.
#[derive(Clone)]
pub struct FullIndex {
  remote: Arc<dyn RemoteCatalog>,
  cache: QueryCache<CatalogQueryKey, Vec<CatalogEntry>>,
  limit: u32,
}

impl FullIndex {
  /// `limit` must be at least the remote catalog size; a smaller catalog is
  /// reported truncated in the log.
  pub fn new(
    remote: Arc<dyn RemoteCatalog>,
    cache: QueryCache<CatalogQueryKey, Vec<CatalogEntry>>,
    limit: u32,
  ) -> Self {
    Self {
      remote,
      cache,
      limit,
    }
  }

  pub fn limit(&self) -> u32 {
    self.limit
  }

  /// Fetch every entry from offset 0 up to `limit`, in catalog order.
  pub async fn fetch_full_index(&self, limit: u32) -> Result<Vec<CatalogEntry>, FetchError> {
    let key = CatalogQueryKey::FullIndex { limit };
    Ok(self.cache.fetch(&key, self.index_fetcher(limit)).await?.data)
  }

  /// Fetch with the configured limit.
  pub async fn fetch(&self) -> Result<Vec<CatalogEntry>, FetchError> {
    self.fetch_full_index(self.limit).await
  }

  /// Unstarted query over the index with the configured limit.
  pub fn query(&self) -> Query<CatalogQueryKey, Vec<CatalogEntry>> {
    Query::with_fetcher(
      self.cache.clone(),
      CatalogQueryKey::FullIndex { limit: self.limit },
      self.index_fetcher(self.limit),
    )
  }

  fn index_fetcher(&self, limit: u32) -> Fetcher<Vec<CatalogEntry>> {
    let remote = Arc::clone(&self.remote);
    fetcher(move || {
      let remote = Arc::clone(&remote);
      async move {
        let page = remote.list_entries(0, limit).await?;
        if page.count > limit {
          warn!(count = page.count, limit, "full index truncated");
        }
        let entries = to_entries(&page.results, &IdResolver::pokemon());
        info!(entries = entries.len(), "full index loaded");
        Ok(entries)
      }
    })
  }
}

/// What the catalog list should display for the current search query.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchView {
  /// Empty query: the incrementally paged catalog
  Paged(Vec<CatalogEntry>),
  /// Non-empty query, index not yet available
  LoadingIndex,
  /// Non-empty query, index failed and nothing to search
  IndexFailed(FetchError),
  /// Entries whose name contains the query, in index order. Empty means no
  /// results.
  Matches(Vec<CatalogEntry>),
}

impl SearchView {
  pub fn entries(&self) -> &[CatalogEntry] {
    match self {
      SearchView::Paged(entries) | SearchView::Matches(entries) => entries,
      SearchView::LoadingIndex | SearchView::IndexFailed(_) => &[],
    }
  }
}

/// Trim and lowercase a raw search query.
pub fn normalize_query(query: &str) -> String {
  query.trim().to_lowercase()
}

/// Case-insensitive substring match over names, preserving order.
pub fn filter_entries(index: &[CatalogEntry], query: &str) -> Vec<CatalogEntry> {
  let needle = normalize_query(query);
  index
    .iter()
    .filter(|entry| entry.name.to_lowercase().contains(&needle))
    .cloned()
    .collect()
}

/// Decide the displayed list.
///
/// An empty (or whitespace-only) query shows the paged entries and never
/// needs the index. Otherwise the index is filtered once available.
pub fn search(
  query: &str,
  paged: &[CatalogEntry],
  index: Option<&QuerySnapshot<Vec<CatalogEntry>>>,
) -> SearchView {
  let needle = normalize_query(query);
  if needle.is_empty() {
    return SearchView::Paged(paged.to_vec());
  }
  match index {
    Some(snapshot) => match (&snapshot.data, &snapshot.error) {
      (Some(entries), _) => SearchView::Matches(filter_entries(entries, &needle)),
      (None, Some(_)) if snapshot.is_fetching => SearchView::LoadingIndex,
      (None, Some(err)) => SearchView::IndexFailed(err.clone()),
      (None, None) => SearchView::LoadingIndex,
    },
    None => SearchView::LoadingIndex,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CachePolicy;
  use crate::testing::{MockOp, MockRemoteCatalog, RecordedCall};
  use std::time::Duration;

  fn entry(id: u32, name: &str) -> CatalogEntry {
    CatalogEntry {
      id,
      name: name.to_string(),
    }
  }

  fn index_over(mock: &Arc<MockRemoteCatalog>, limit: u32) -> FullIndex {
    let day = Duration::from_secs(24 * 60 * 60);
    FullIndex::new(
      mock.clone(),
      QueryCache::new("full_index", CachePolicy::new(day, day)),
      limit,
    )
  }

  fn ready(entries: Vec<CatalogEntry>) -> QuerySnapshot<Vec<CatalogEntry>> {
    QuerySnapshot {
      data: Some(entries),
      ..QuerySnapshot::pending()
    }
  }

  #[tokio::test]
  async fn test_full_index_single_request() {
    let mock = Arc::new(MockRemoteCatalog::with_catalog(40));
    let index = index_over(&mock, 2000);

    let entries = index.fetch().await.unwrap();
    assert_eq!(entries.len(), 40);
    assert_eq!(entries[39], entry(40, "mon-40"));
    assert_eq!(mock.calls(), vec![RecordedCall::List { offset: 0, limit: 2000 }]);

    // Fresh for a day
    index.fetch().await.unwrap();
    assert_eq!(mock.call_count(MockOp::List), 1);
  }

  #[tokio::test]
  async fn test_full_index_matches_paged_concatenation() {
    use crate::catalog::CatalogPager;

    let mock = Arc::new(MockRemoteCatalog::with_catalog(47));
    let index = index_over(&mock, 2000);
    let mut pager = CatalogPager::new(
      mock.clone(),
      QueryCache::new("catalog_page", CachePolicy::always_stale()),
      10,
    );
    while pager.load_next().await.unwrap() {}

    assert_eq!(pager.pages().len(), 5);
    assert_eq!(pager.entries(), index.fetch().await.unwrap());
  }

  #[tokio::test]
  async fn test_limit_below_catalog_truncates() {
    let mock = Arc::new(MockRemoteCatalog::with_catalog(40));
    let index = index_over(&mock, 30);
    assert_eq!(index.fetch().await.unwrap().len(), 30);
  }

  #[test]
  fn test_filter_substring_case_insensitive() {
    let index = vec![
      entry(25, "pikachu"),
      entry(172, "pichu"),
      entry(26, "raichu"),
      entry(1, "bulbasaur"),
    ];
    let names = |v: Vec<CatalogEntry>| v.into_iter().map(|e| e.name).collect::<Vec<_>>();
    assert_eq!(names(filter_entries(&index, "chu")), ["pikachu", "pichu", "raichu"]);
    assert_eq!(names(filter_entries(&index, "  PIKA ")), ["pikachu"]);
    assert!(filter_entries(&index, "zzz").is_empty());
  }

  #[test]
  fn test_search_empty_query_shows_paged() {
    let paged = vec![entry(1, "bulbasaur")];
    assert_eq!(search("", &paged, None), SearchView::Paged(paged.clone()));
    assert_eq!(search("   ", &paged, None), SearchView::Paged(paged));
  }

  #[test]
  fn test_search_states() {
    let paged = vec![entry(1, "bulbasaur")];
    assert_eq!(search("chu", &paged, None), SearchView::LoadingIndex);
    assert_eq!(
      search("chu", &paged, Some(&QuerySnapshot::pending())),
      SearchView::LoadingIndex
    );

    let failed = QuerySnapshot {
      error: Some(FetchError::Network("down".into())),
      ..QuerySnapshot::pending()
    };
    assert!(matches!(
      search("chu", &paged, Some(&failed)),
      SearchView::IndexFailed(_)
    ));
    let retrying = QuerySnapshot {
      is_fetching: true,
      ..failed.clone()
    };
    assert_eq!(search("chu", &paged, Some(&retrying)), SearchView::LoadingIndex);

    let index = ready(vec![entry(25, "pikachu"), entry(1, "bulbasaur")]);
    assert_eq!(
      search("CHU", &paged, Some(&index)),
      SearchView::Matches(vec![entry(25, "pikachu")])
    );
    // No results is distinct from loading
    assert_eq!(search("zzz", &paged, Some(&index)), SearchView::Matches(vec![]));
  }
}
