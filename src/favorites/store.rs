//! Favorites persistence seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// A persisted favorite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteRecord {
  pub pokemon_id: u32,
  pub name: String,
  pub image_url: Option<String>,
}

/// Effect of a toggle request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
  Added,
  Removed,
  /// The stored state no longer matched the caller's view, nothing was
  /// written
  Unchanged { is_favorite: bool },
}

impl ToggleOutcome {
  /// Membership after the toggle
  pub fn is_favorite(&self) -> bool {
    match self {
      ToggleOutcome::Added => true,
      ToggleOutcome::Removed => false,
      ToggleOutcome::Unchanged { is_favorite } => *is_favorite,
    }
  }
}

/// Durable set of favorites, keyed by entry id.
#[async_trait]
pub trait FavoriteStore: Send + Sync {
  /// Insert or update a favorite. An existing favorite keeps its position.
  async fn add_favorite(&self, record: &FavoriteRecord) -> Result<(), FetchError>;

  /// Remove a favorite. Removing an absent id is not an error.
  async fn remove_favorite(&self, pokemon_id: u32) -> Result<(), FetchError>;

  /// All favorites, oldest first.
  async fn all_favorites(&self) -> Result<Vec<FavoriteRecord>, FetchError>;

  async fn is_favorite(&self, pokemon_id: u32) -> Result<bool, FetchError>;

  /// Atomically flip membership of `record.pokemon_id`, provided the current
  /// membership equals `expected_current`.
  async fn toggle(
    &self,
    record: &FavoriteRecord,
    expected_current: bool,
  ) -> Result<ToggleOutcome, FetchError>;
}
