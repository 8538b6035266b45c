//! SQLite-backed favorites store.

use async_trait::async_trait;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::store::{FavoriteRecord, FavoriteStore, ToggleOutcome};
use crate::error::FetchError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS favorites (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    pokemon_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    image_url TEXT,
    added_at TEXT NOT NULL
);
"#;

pub struct SqliteFavoriteStore {
  conn: Mutex<Connection>,
}

impl SqliteFavoriteStore {
  /// Open or create the database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, FetchError> {
    self
      .conn
      .lock()
      .map_err(|e| FetchError::Storage(format!("Lock poisoned: {}", e)))
  }
}

fn upsert(conn: &Connection, record: &FavoriteRecord) -> rusqlite::Result<usize> {
  conn.execute(
    "INSERT INTO favorites (pokemon_id, name, image_url, added_at) VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(pokemon_id) DO UPDATE SET name = excluded.name, image_url = excluded.image_url",
    params![
      record.pokemon_id,
      record.name,
      record.image_url,
      Utc::now().to_rfc3339()
    ],
  )
}

fn contains(conn: &Connection, pokemon_id: u32) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM favorites WHERE pokemon_id = ?1)",
    params![pokemon_id],
    |row| row.get(0),
  )
}

#[async_trait]
impl FavoriteStore for SqliteFavoriteStore {
  async fn add_favorite(&self, record: &FavoriteRecord) -> Result<(), FetchError> {
    let conn = self.lock()?;
    upsert(&conn, record)?;
    debug!(pokemon_id = record.pokemon_id, "favorite stored");
    Ok(())
  }

  async fn remove_favorite(&self, pokemon_id: u32) -> Result<(), FetchError> {
    let conn = self.lock()?;
    conn.execute(
      "DELETE FROM favorites WHERE pokemon_id = ?1",
      params![pokemon_id],
    )?;
    debug!(pokemon_id, "favorite removed");
    Ok(())
  }

  async fn all_favorites(&self) -> Result<Vec<FavoriteRecord>, FetchError> {
    let conn = self.lock()?;
    let mut stmt =
      conn.prepare("SELECT pokemon_id, name, image_url FROM favorites ORDER BY position")?;
    let rows = stmt.query_map([], |row| {
      Ok(FavoriteRecord {
        pokemon_id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get(2)?,
      })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
  }

  async fn is_favorite(&self, pokemon_id: u32) -> Result<bool, FetchError> {
    let conn = self.lock()?;
    Ok(contains(&conn, pokemon_id)?)
  }

  async fn toggle(
    &self,
    record: &FavoriteRecord,
    expected_current: bool,
  ) -> Result<ToggleOutcome, FetchError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = contains(&tx, record.pokemon_id)?;
    if current != expected_current {
      debug!(
        pokemon_id = record.pokemon_id,
        current, expected_current, "toggle skipped, state changed underneath"
      );
      return Ok(ToggleOutcome::Unchanged {
        is_favorite: current,
      });
    }

    let outcome = if current {
      tx.execute(
        "DELETE FROM favorites WHERE pokemon_id = ?1",
        params![record.pokemon_id],
      )?;
      ToggleOutcome::Removed
    } else {
      upsert(&tx, record)?;
      ToggleOutcome::Added
    };
    tx.commit()?;
    Ok(outcome)
  }
}
