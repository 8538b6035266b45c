//! Query keys for every cached view.

use sha2::{Digest, Sha256};

use crate::cache::QueryKey;

/// Composite key: operation name plus parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CatalogQueryKey {
  /// One page of the paged catalog
  CatalogPage { page_size: u32, page_index: u32 },
  /// The whole catalog in one request, for search
  FullIndex { limit: u32 },
  /// Full record by name
  Detail { name: String },
  /// Species record by name
  Species { name: String },
  /// Flattened evolution line by chain id
  EvolutionChain { id: u32 },
  /// All favorited entries
  Favorites,
  /// Whether one id is favorited
  IsFavorite { id: u32 },
}

impl QueryKey for CatalogQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::CatalogPage {
        page_size,
        page_index,
      } => format!("catalog_page:{}:{}", page_size, page_index),
      Self::FullIndex { limit } => format!("full_index:{}", limit),
      Self::Detail { name } => format!("detail:{}", normalize_name(name)),
      Self::Species { name } => format!("species:{}", normalize_name(name)),
      Self::EvolutionChain { id } => format!("evolution_chain:{}", id),
      Self::Favorites => "favorites".to_string(),
      Self::IsFavorite { id } => format!("is_favorite:{}", id),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::CatalogPage {
        page_size,
        page_index,
      } => format!("catalog page {} (size {})", page_index, page_size),
      Self::FullIndex { limit } => format!("full index (limit {})", limit),
      Self::Detail { name } => format!("detail {}", name),
      Self::Species { name } => format!("species {}", name),
      Self::EvolutionChain { id } => format!("evolution chain {}", id),
      Self::Favorites => "all favorites".to_string(),
      Self::IsFavorite { id } => format!("is favorite {}", id),
    }
  }
}

/// Names are slugs; trim and lowercase so `Pikachu ` and `pikachu` share an entry.
pub fn normalize_name(name: &str) -> String {
  name.trim().to_lowercase()
}
