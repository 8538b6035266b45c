//! Mutation events consumed by the cache coordinator.

/// Something changed outside the remote catalog that cached views depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DexEvent {
  /// A favorite was added or removed for this id
  FavoritesChanged { pokemon_id: u32 },
}
