//! Favorites: durable storage plus cached, invalidated views over it.

mod bridge;
mod memory;
mod sqlite;
mod store;

pub use bridge::{FavoritesBridge, ToggleFavorite};
pub use memory::MemoryFavoriteStore;
pub use sqlite::SqliteFavoriteStore;
pub use store::{FavoriteRecord, FavoriteStore, ToggleOutcome};
