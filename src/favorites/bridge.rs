//! Cached favorites views and the toggle mutation.

use std::sync::Arc;
use tracing::{info, warn};

use super::store::{FavoriteRecord, FavoriteStore, ToggleOutcome};
use crate::cache::{fetcher, CacheCoordinator, CachePolicy, Fetcher, QueryCache};
use crate::display::artwork_url;
use crate::error::FetchError;
use crate::event::DexEvent;
use crate::keys::CatalogQueryKey;
use crate::query::Query;

/// Toggle request, carrying the caller's view of the current membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleFavorite {
  pub pokemon_id: u32,
  pub name: String,
  /// Defaults to the official artwork url
  pub image_url: Option<String>,
  pub is_currently_favorite: bool,
}

/// Exposes the favorite store through two cached views, the full list and
/// per-id membership.
///
/// A successful toggle publishes [`DexEvent::FavoritesChanged`]; both views
/// listen for it, so the next read after a toggle observes the mutation.
#[derive(Clone)]
pub struct FavoritesBridge {
  store: Arc<dyn FavoriteStore>,
  list: QueryCache<CatalogQueryKey, Vec<FavoriteRecord>>,
  flags: QueryCache<CatalogQueryKey, bool>,
  coordinator: CacheCoordinator<CatalogQueryKey, DexEvent>,
}

impl FavoritesBridge {
  pub fn new(
    store: Arc<dyn FavoriteStore>,
    coordinator: &CacheCoordinator<CatalogQueryKey, DexEvent>,
    list_policy: CachePolicy,
    flag_policy: CachePolicy,
  ) -> Self {
    let list = coordinator.register("favorites", list_policy);
    let flags = coordinator.register("is_favorite", flag_policy);

    coordinator.on_event(|event| match event {
      DexEvent::FavoritesChanged { pokemon_id } => vec![
        CatalogQueryKey::Favorites,
        CatalogQueryKey::IsFavorite { id: *pokemon_id },
      ],
    });

    Self {
      store,
      list,
      flags,
      coordinator: coordinator.clone(),
    }
  }

  /// All favorites in insertion order.
  pub async fn list_favorites(&self) -> Result<Vec<FavoriteRecord>, FetchError> {
    Ok(
      self
        .list
        .fetch(&CatalogQueryKey::Favorites, self.list_fetcher())
        .await?
        .data,
    )
  }

  pub async fn is_favorite(&self, pokemon_id: u32) -> Result<bool, FetchError> {
    let key = CatalogQueryKey::IsFavorite { id: pokemon_id };
    Ok(self.flags.fetch(&key, self.flag_fetcher(pokemon_id)).await?.data)
  }

  pub fn favorites_query(&self) -> Query<CatalogQueryKey, Vec<FavoriteRecord>> {
    Query::with_fetcher(
      self.list.clone(),
      CatalogQueryKey::Favorites,
      self.list_fetcher(),
    )
  }

  pub fn is_favorite_query(&self, pokemon_id: u32) -> Query<CatalogQueryKey, bool> {
    Query::with_fetcher(
      self.flags.clone(),
      CatalogQueryKey::IsFavorite { id: pokemon_id },
      self.flag_fetcher(pokemon_id),
    )
  }

  /// Add the entry if the caller believes it absent, remove it otherwise.
  ///
  /// The store applies the flip only if its state still matches
  /// `is_currently_favorite`. Either way the views are invalidated on
  /// success. A store failure is returned as-is and invalidates nothing.
  pub async fn toggle_favorite(&self, request: ToggleFavorite) -> Result<ToggleOutcome, FetchError> {
    let record = FavoriteRecord {
      pokemon_id: request.pokemon_id,
      image_url: Some(
        request
          .image_url
          .unwrap_or_else(|| artwork_url(request.pokemon_id)),
      ),
      name: request.name,
    };

    let outcome = match self.store.toggle(&record, request.is_currently_favorite).await {
      Ok(outcome) => outcome,
      Err(err) => {
        warn!(pokemon_id = record.pokemon_id, error = %err, "favorite toggle failed");
        return Err(err);
      }
    };

    if let ToggleOutcome::Unchanged { is_favorite } = outcome {
      warn!(
        pokemon_id = record.pokemon_id,
        is_favorite, "favorite toggle skipped, stored state differs from view"
      );
    } else {
      info!(pokemon_id = record.pokemon_id, ?outcome, "favorite toggled");
    }

    self.coordinator.publish(&DexEvent::FavoritesChanged {
      pokemon_id: record.pokemon_id,
    });
    Ok(outcome)
  }

  fn list_fetcher(&self) -> Fetcher<Vec<FavoriteRecord>> {
    let store = Arc::clone(&self.store);
    fetcher(move || {
      let store = Arc::clone(&store);
      async move { store.all_favorites().await }
    })
  }

  fn flag_fetcher(&self, pokemon_id: u32) -> Fetcher<bool> {
    let store = Arc::clone(&self.store);
    fetcher(move || {
      let store = Arc::clone(&store);
      async move { store.is_favorite(pokemon_id).await }
    })
  }
}
