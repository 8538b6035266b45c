//! Catalog browsing: paging, search and per-entry details.

mod browser;
mod detail;
mod evolution;
mod index;
mod pager;

pub use browser::CatalogBrowser;
pub use detail::{
  DetailResolver, EvolutionError, EvolutionLine, EvolutionStage, EvolutionState, EvolutionTracker,
};
pub use evolution::flatten_evolution;
pub use index::{filter_entries, normalize_query, search, FullIndex, SearchView};
pub use pager::CatalogPager;
