//! Composition root wiring every cached view to one coordinator.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::cache::{CacheCoordinator, QueryCache};
use crate::catalog::{CatalogBrowser, CatalogPager, DetailResolver, FullIndex};
use crate::config::Config;
use crate::event::DexEvent;
use crate::favorites::{FavoriteStore, FavoritesBridge};
use crate::keys::CatalogQueryKey;
use crate::pokeapi::{Page, RemoteCatalog};

/// Owns the caches for one session.
///
/// Views created from the same `Dex` share entries, in-flight fetches and
/// invalidation.
#[derive(Clone)]
pub struct Dex {
  coordinator: CacheCoordinator<CatalogQueryKey, DexEvent>,
  remote: Arc<dyn RemoteCatalog>,
  pages: QueryCache<CatalogQueryKey, Page>,
  page_size: u32,
  index: FullIndex,
  details: DetailResolver,
  favorites: FavoritesBridge,
  config: Config,
}

impl Dex {
  pub fn new(
    config: &Config,
    remote: Arc<dyn RemoteCatalog>,
    store: Arc<dyn FavoriteStore>,
  ) -> Self {
    let coordinator = CacheCoordinator::new();
    let windows = &config.cache;

    let pages = coordinator.register("catalog_page", windows.catalog_page.policy());
    let index = FullIndex::new(
      Arc::clone(&remote),
      coordinator.register("full_index", windows.full_index.policy()),
      config.catalog.index_limit,
    );
    let details = DetailResolver::new(
      Arc::clone(&remote),
      coordinator.register("detail", windows.detail.policy()),
      coordinator.register("species", windows.species.policy()),
      coordinator.register("evolution_chain", windows.evolution_chain.policy()),
    );
    let favorites = FavoritesBridge::new(
      store,
      &coordinator,
      windows.favorites.policy(),
      windows.is_favorite.policy(),
    );

    Self {
      coordinator,
      remote,
      pages,
      page_size: config.catalog.page_size,
      index,
      details,
      favorites,
      config: config.clone(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// A fresh pager over the shared page cache.
  pub fn pager(&self) -> CatalogPager {
    CatalogPager::new(Arc::clone(&self.remote), self.pages.clone(), self.page_size)
  }

  pub fn browser(&self) -> CatalogBrowser {
    CatalogBrowser::new(self.pager(), self.index.clone())
  }

  pub fn index(&self) -> &FullIndex {
    &self.index
  }

  pub fn details(&self) -> &DetailResolver {
    &self.details
  }

  pub fn favorites(&self) -> &FavoritesBridge {
    &self.favorites
  }

  pub fn coordinator(&self) -> &CacheCoordinator<CatalogQueryKey, DexEvent> {
    &self.coordinator
  }

  /// Start periodic eviction of idle entries.
  pub fn spawn_sweeper(&self) -> JoinHandle<()> {
    self
      .coordinator
      .spawn_sweeper(self.config.cache.sweep_interval())
  }
}
