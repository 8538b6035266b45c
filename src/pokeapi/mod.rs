//! Remote catalog access for PokéAPI v2.

pub mod api_types;
pub mod client;
pub mod remote;
pub mod types;

pub use client::PokeApiClient;
pub use remote::RemoteCatalog;
pub use types::{
  AbilitySlot, CatalogEntry, DetailRecord, EvolutionEntry, EvolutionNode, Page, ResourceRef,
  SpeciesRecord, Stat, TypeSlot,
};
