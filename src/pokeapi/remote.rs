//! The remote catalog collaborator.

use async_trait::async_trait;

use super::types::{DetailRecord, EvolutionNode, Page, SpeciesRecord};
use crate::error::FetchError;

/// Read-only access to the remote catalog service.
///
/// Implementations are injected into the pager, index builder and detail
/// resolver; ordering must be stable across repeated calls with identical
/// offset/limit.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
  /// List entries starting at `offset`.
  async fn list_entries(&self, offset: u32, limit: u32) -> Result<Page, FetchError>;

  async fn detail_by_name(&self, name: &str) -> Result<DetailRecord, FetchError>;

  async fn species_by_name(&self, name: &str) -> Result<SpeciesRecord, FetchError>;

  /// Fetch the root of an evolution lineage tree.
  async fn evolution_chain_by_id(&self, id: u32) -> Result<EvolutionNode, FetchError>;
}
