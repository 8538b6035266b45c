//! In-process favorites store, for ephemeral sessions.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use super::store::{FavoriteRecord, FavoriteStore, ToggleOutcome};
use crate::error::FetchError;

#[derive(Debug, Default)]
pub struct MemoryFavoriteStore {
  records: Mutex<Vec<FavoriteRecord>>,
}

impl MemoryFavoriteStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Vec<FavoriteRecord>> {
    self
      .records
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

fn upsert(records: &mut Vec<FavoriteRecord>, record: &FavoriteRecord) {
  match records.iter_mut().find(|r| r.pokemon_id == record.pokemon_id) {
    Some(existing) => *existing = record.clone(),
    None => records.push(record.clone()),
  }
}

#[async_trait]
impl FavoriteStore for MemoryFavoriteStore {
  async fn add_favorite(&self, record: &FavoriteRecord) -> Result<(), FetchError> {
    upsert(&mut self.lock(), record);
    Ok(())
  }

  async fn remove_favorite(&self, pokemon_id: u32) -> Result<(), FetchError> {
    self.lock().retain(|r| r.pokemon_id != pokemon_id);
    Ok(())
  }

  async fn all_favorites(&self) -> Result<Vec<FavoriteRecord>, FetchError> {
    Ok(self.lock().clone())
  }

  async fn is_favorite(&self, pokemon_id: u32) -> Result<bool, FetchError> {
    Ok(self.lock().iter().any(|r| r.pokemon_id == pokemon_id))
  }

  async fn toggle(
    &self,
    record: &FavoriteRecord,
    expected_current: bool,
  ) -> Result<ToggleOutcome, FetchError> {
    let mut records = self.lock();
    let current = records.iter().any(|r| r.pokemon_id == record.pokemon_id);
    if current != expected_current {
      return Ok(ToggleOutcome::Unchanged {
        is_favorite: current,
      });
    }
    if current {
      records.retain(|r| r.pokemon_id != record.pokemon_id);
      Ok(ToggleOutcome::Removed)
    } else {
      upsert(&mut records, record);
      Ok(ToggleOutcome::Added)
    }
  }
}
