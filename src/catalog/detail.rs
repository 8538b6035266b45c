//! Detail, species and evolution-line resolution.
//!
//! The evolution line is a dependent chain:
//! 1. Species record by name
//! 2. Lineage reference extracted from the species record
//! 3. Lineage tree by resolved id, flattened for display
//!
//! Each step is cached in its own category. Step 3 is never issued before
//! step 1 has produced a reference.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::cache::{fetcher, Fetcher, QueryCache};
use crate::error::FetchError;
use crate::keys::{normalize_name, CatalogQueryKey};
use crate::pokeapi::{DetailRecord, EvolutionEntry, RemoteCatalog, SpeciesRecord};
use crate::query::{Query, QueryState};
use crate::resource::IdResolver;

use super::evolution::flatten_evolution;

/// Step of the evolution chain that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvolutionStage {
  Species,
  Chain,
}

impl std::fmt::Display for EvolutionStage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      EvolutionStage::Species => write!(f, "species lookup"),
      EvolutionStage::Chain => write!(f, "evolution chain lookup"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {source}")]
pub struct EvolutionError {
  pub stage: EvolutionStage,
  pub source: FetchError,
}

/// Outcome of a successful evolution-line lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvolutionLine {
  /// The species has no lineage reference
  NoEvolutionData,
  /// Flattened lineage, base form first
  Lineage(Vec<EvolutionEntry>),
}

#[derive(Clone)]
pub struct DetailResolver {
  remote: Arc<dyn RemoteCatalog>,
  details: QueryCache<CatalogQueryKey, DetailRecord>,
  species: QueryCache<CatalogQueryKey, SpeciesRecord>,
  chains: QueryCache<CatalogQueryKey, Vec<EvolutionEntry>>,
  chain_ids: IdResolver,
}

impl DetailResolver {
  pub fn new(
    remote: Arc<dyn RemoteCatalog>,
    details: QueryCache<CatalogQueryKey, DetailRecord>,
    species: QueryCache<CatalogQueryKey, SpeciesRecord>,
    chains: QueryCache<CatalogQueryKey, Vec<EvolutionEntry>>,
  ) -> Self {
    Self {
      remote,
      details,
      species,
      chains,
      chain_ids: IdResolver::generic(),
    }
  }

  pub async fn fetch_detail(&self, name: &str) -> Result<DetailRecord, FetchError> {
    let name = require_name(name)?;
    let key = CatalogQueryKey::Detail { name: name.clone() };
    Ok(self.details.fetch(&key, self.detail_fetcher(name)).await?.data)
  }

  pub async fn fetch_species(&self, name: &str) -> Result<SpeciesRecord, FetchError> {
    let name = require_name(name)?;
    let key = CatalogQueryKey::Species { name: name.clone() };
    Ok(self.species.fetch(&key, self.species_fetcher(name)).await?.data)
  }

  /// Fetch and flatten the lineage a species record points to.
  ///
  /// The reference must end in a numeric id; anything else is
  /// `InvalidReference` and no request is made.
  pub async fn fetch_evolutions(&self, chain_ref: &str) -> Result<Vec<EvolutionEntry>, FetchError> {
    let id = self.chain_id(chain_ref)?;
    self.fetch_evolutions_by_id(id).await
  }

  pub async fn fetch_evolutions_by_id(&self, id: u32) -> Result<Vec<EvolutionEntry>, FetchError> {
    let key = CatalogQueryKey::EvolutionChain { id };
    Ok(self.chains.fetch(&key, self.chain_fetcher(id)).await?.data)
  }

  /// Resolve the whole dependent chain for `name`.
  pub async fn evolution_line(&self, name: &str) -> Result<EvolutionLine, EvolutionError> {
    let species = self
      .fetch_species(name)
      .await
      .map_err(|source| EvolutionError {
        stage: EvolutionStage::Species,
        source,
      })?;

    let Some(chain_ref) = species.evolution_chain_ref else {
      debug!(name, "species has no evolution data");
      return Ok(EvolutionLine::NoEvolutionData);
    };

    let lineage = self
      .fetch_evolutions(&chain_ref)
      .await
      .map_err(|source| EvolutionError {
        stage: EvolutionStage::Chain,
        source,
      })?;
    Ok(EvolutionLine::Lineage(lineage))
  }

  /// Unstarted detail query. An empty name yields a query that never fetches
  /// successfully.
  pub fn detail_query(&self, name: &str) -> Query<CatalogQueryKey, DetailRecord> {
    let name = normalize_name(name);
    Query::with_fetcher(
      self.details.clone(),
      CatalogQueryKey::Detail { name: name.clone() },
      self.detail_fetcher(name),
    )
  }

  pub fn species_query(&self, name: &str) -> Query<CatalogQueryKey, SpeciesRecord> {
    let name = normalize_name(name);
    Query::with_fetcher(
      self.species.clone(),
      CatalogQueryKey::Species { name: name.clone() },
      self.species_fetcher(name),
    )
  }

  pub fn evolution_query(&self, id: u32) -> Query<CatalogQueryKey, Vec<EvolutionEntry>> {
    Query::with_fetcher(
      self.chains.clone(),
      CatalogQueryKey::EvolutionChain { id },
      self.chain_fetcher(id),
    )
  }

  /// Poll-driven evolution-line tracker for `name`.
  pub fn evolution_tracker(&self, name: &str) -> EvolutionTracker {
    EvolutionTracker {
      resolver: self.clone(),
      name: normalize_name(name),
      species: None,
      chain: None,
      state: EvolutionState::Idle,
    }
  }

  fn chain_id(&self, chain_ref: &str) -> Result<u32, FetchError> {
    self
      .chain_ids
      .resolve(chain_ref)
      .ok_or_else(|| FetchError::InvalidReference(chain_ref.to_string()))
  }

  fn detail_fetcher(&self, name: String) -> Fetcher<DetailRecord> {
    let remote = Arc::clone(&self.remote);
    fetcher(move || {
      let remote = Arc::clone(&remote);
      let name = name.clone();
      async move {
        require_name(&name)?;
        remote.detail_by_name(&name).await
      }
    })
  }

  fn species_fetcher(&self, name: String) -> Fetcher<SpeciesRecord> {
    let remote = Arc::clone(&self.remote);
    fetcher(move || {
      let remote = Arc::clone(&remote);
      let name = name.clone();
      async move {
        require_name(&name)?;
        remote.species_by_name(&name).await
      }
    })
  }

  fn chain_fetcher(&self, id: u32) -> Fetcher<Vec<EvolutionEntry>> {
    let remote = Arc::clone(&self.remote);
    let resolver = self.chain_ids.clone();
    fetcher(move || {
      let remote = Arc::clone(&remote);
      let resolver = resolver.clone();
      async move {
        let root = remote.evolution_chain_by_id(id).await?;
        Ok(flatten_evolution(&root, &resolver))
      }
    })
  }
}

fn require_name(name: &str) -> Result<String, FetchError> {
  let name = normalize_name(name);
  if name.is_empty() {
    return Err(FetchError::InvalidReference("empty name".to_string()));
  }
  Ok(name)
}

/// Render state of a dependent evolution-line lookup
#[derive(Debug, Clone, PartialEq)]
pub enum EvolutionState {
  /// Not started, or the name is empty
  Idle,
  LoadingSpecies,
  NoEvolutionData,
  LoadingChain { id: u32 },
  Ready(Vec<EvolutionEntry>),
  Failed(EvolutionError),
}

/// Observes the species query, then the lineage query once its id is known.
pub struct EvolutionTracker {
  resolver: DetailResolver,
  name: String,
  species: Option<Query<CatalogQueryKey, SpeciesRecord>>,
  chain: Option<Query<CatalogQueryKey, Vec<EvolutionEntry>>>,
  state: EvolutionState,
}

impl EvolutionTracker {
  /// Start the species lookup. Does nothing for an empty name.
  ///
  /// Once started, calling this again re-issues a failed stage.
  pub fn fetch(&mut self) {
    if self.species.is_some() {
      self.retry();
      return;
    }
    self.start();
  }

  /// Re-issue the stage that failed. Returns `true` if a fetch started.
  ///
  /// An unresolvable chain reference is not retried; refetching the species
  /// record would yield the same reference.
  pub fn retry(&mut self) -> bool {
    let stage = match &self.state {
      EvolutionState::Failed(err) => err.stage,
      _ => return false,
    };
    let retried = match stage {
      EvolutionStage::Species => self.species.as_mut().is_some_and(|q| q.retry()),
      EvolutionStage::Chain => self.chain.as_mut().is_some_and(|q| q.retry()),
    };
    if retried {
      self.update();
    }
    retried
  }

  /// Pick up query changes. Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let species = self.species.as_mut().is_some_and(|q| q.poll());
    let chain = self.chain.as_mut().is_some_and(|q| q.poll());
    if species || chain {
      return self.update();
    }
    false
  }

  /// Wait until the tracker leaves its loading states.
  pub async fn settled(&mut self) -> &EvolutionState {
    if self.species.is_none() {
      self.start();
    }
    loop {
      match self.state {
        EvolutionState::LoadingSpecies => {
          if let Some(q) = self.species.as_mut() {
            q.settled().await;
          }
        }
        EvolutionState::LoadingChain { .. } => {
          if let Some(q) = self.chain.as_mut() {
            q.settled().await;
          }
        }
        _ => break,
      }
      if !self.update() && self.is_loading() {
        // Settled query without a transition cannot progress further
        break;
      }
    }
    &self.state
  }

  pub fn state(&self) -> &EvolutionState {
    &self.state
  }

  pub fn is_loading(&self) -> bool {
    matches!(
      self.state,
      EvolutionState::LoadingSpecies | EvolutionState::LoadingChain { .. }
    )
  }

  fn start(&mut self) {
    if self.name.is_empty() {
      return;
    }
    let mut species = self.resolver.species_query(&self.name);
    species.fetch();
    self.species = Some(species);
    self.update();
  }

  fn update(&mut self) -> bool {
    let next = self.derive();
    if next == self.state {
      return false;
    }
    self.state = next;
    true
  }

  fn derive(&mut self) -> EvolutionState {
    let Some(species) = &self.species else {
      return EvolutionState::Idle;
    };

    let chain_ref = match species.state() {
      QueryState::Idle | QueryState::Loading => return EvolutionState::LoadingSpecies,
      QueryState::Error(source) => {
        return EvolutionState::Failed(EvolutionError {
          stage: EvolutionStage::Species,
          source,
        })
      }
      QueryState::Success(record) => record.evolution_chain_ref.clone(),
    };

    let Some(chain_ref) = chain_ref else {
      self.chain = None;
      return EvolutionState::NoEvolutionData;
    };
    let id = match self.resolver.chain_id(&chain_ref) {
      Ok(id) => id,
      Err(source) => {
        return EvolutionState::Failed(EvolutionError {
          stage: EvolutionStage::Chain,
          source,
        })
      }
    };

    // Lineage query is created only now that its id is known
    if self.chain.as_ref().map(|q| q.key()) != Some(&CatalogQueryKey::EvolutionChain { id }) {
      let mut chain = self.resolver.evolution_query(id);
      chain.fetch();
      self.chain = Some(chain);
    }
    let Some(chain) = &self.chain else {
      return EvolutionState::LoadingChain { id };
    };

    match chain.state() {
      QueryState::Idle | QueryState::Loading => EvolutionState::LoadingChain { id },
      QueryState::Error(source) => EvolutionState::Failed(EvolutionError {
        stage: EvolutionStage::Chain,
        source,
      }),
      QueryState::Success(lineage) => EvolutionState::Ready(lineage.clone()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CachePolicy;
  use crate::testing::{fixtures, MockOp, MockRemoteCatalog, RecordedCall};
  use std::time::Duration;

  fn resolver(mock: &Arc<MockRemoteCatalog>) -> DetailResolver {
    let policy = CachePolicy::new(Duration::from_secs(600), Duration::from_secs(300));
    DetailResolver::new(
      mock.clone(),
      QueryCache::new("detail", policy),
      QueryCache::new("species", policy),
      QueryCache::new("evolution_chain", policy),
    )
  }

  fn eevee_mock() -> Arc<MockRemoteCatalog> {
    let mock = MockRemoteCatalog::new();
    mock.add_detail(fixtures::detail(133, "eevee"));
    mock.add_species(fixtures::species("eevee", Some(67)));
    mock.add_chain(67, fixtures::eevee_chain());
    Arc::new(mock)
  }

  fn names(entries: &[EvolutionEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
  }

  #[tokio::test]
  async fn test_fetch_detail_cached() {
    let mock = eevee_mock();
    let resolver = resolver(&mock);

    let record = resolver.fetch_detail("Eevee").await.unwrap();
    assert_eq!(record.id, 133);
    resolver.fetch_detail("eevee").await.unwrap();
    assert_eq!(mock.call_count(MockOp::Detail), 1);
  }

  #[tokio::test]
  async fn test_empty_name_never_fetches() {
    let mock = eevee_mock();
    let resolver = resolver(&mock);

    assert!(matches!(
      resolver.fetch_detail("  ").await,
      Err(FetchError::InvalidReference(_))
    ));
    assert!(resolver.fetch_species("").await.is_err());

    let mut tracker = resolver.evolution_tracker("");
    tracker.fetch();
    assert_eq!(tracker.state(), &EvolutionState::Idle);
    assert!(mock.calls().is_empty());
  }

  #[tokio::test]
  async fn test_evolution_line_end_to_end() {
    let mock = eevee_mock();
    let resolver = resolver(&mock);

    let line = resolver.evolution_line("eevee").await.unwrap();
    let EvolutionLine::Lineage(lineage) = line else {
      panic!("expected lineage");
    };
    assert_eq!(names(&lineage), ["eevee", "vaporeon", "jolteon", "flareon"]);
    assert_eq!(lineage[0].id, 133);
    assert_eq!(
      mock.calls(),
      vec![
        RecordedCall::Species { name: "eevee".into() },
        RecordedCall::EvolutionChain { id: 67 },
      ]
    );
  }

  #[tokio::test]
  async fn test_no_evolution_data() {
    let mock = MockRemoteCatalog::new();
    mock.add_species(fixtures::species("missingno", None));
    let mock = Arc::new(mock);
    let resolver = resolver(&mock);

    assert_eq!(
      resolver.evolution_line("missingno").await.unwrap(),
      EvolutionLine::NoEvolutionData
    );
    assert_eq!(mock.call_count(MockOp::EvolutionChain), 0);
  }

  #[tokio::test]
  async fn test_stage_specific_errors() {
    let mock = eevee_mock();
    let resolver = resolver(&mock);

    mock.fail_next(MockOp::Species, FetchError::Network("timeout".into()));
    let err = resolver.evolution_line("eevee").await.unwrap_err();
    assert_eq!(err.stage, EvolutionStage::Species);
    assert_eq!(mock.call_count(MockOp::EvolutionChain), 0);

    mock.fail_next(MockOp::EvolutionChain, FetchError::Network("timeout".into()));
    let err = resolver.evolution_line("eevee").await.unwrap_err();
    assert_eq!(err.stage, EvolutionStage::Chain);
    assert!(err.to_string().starts_with("evolution chain lookup failed"));
  }

  #[tokio::test]
  async fn test_malformed_chain_reference() {
    let mock = MockRemoteCatalog::new();
    mock.add_species(SpeciesRecord {
      name: "glitch".into(),
      evolution_chain_ref: Some("https://pokeapi.co/api/v2/evolution-chain/".into()),
    });
    let mock = Arc::new(mock);
    let resolver = resolver(&mock);

    let err = resolver.evolution_line("glitch").await.unwrap_err();
    assert_eq!(err.stage, EvolutionStage::Chain);
    assert!(matches!(err.source, FetchError::InvalidReference(_)));
    assert_eq!(mock.call_count(MockOp::EvolutionChain), 0);
  }

  #[tokio::test]
  async fn test_tracker_walks_dependent_chain() {
    let mock = eevee_mock();
    let resolver = resolver(&mock);

    let mut tracker = resolver.evolution_tracker("eevee");
    assert_eq!(tracker.state(), &EvolutionState::Idle);
    tracker.fetch();
    assert_eq!(tracker.state(), &EvolutionState::LoadingSpecies);

    let state = tracker.settled().await.clone();
    let EvolutionState::Ready(lineage) = state else {
      panic!("expected ready, got {state:?}");
    };
    assert_eq!(names(&lineage), ["eevee", "vaporeon", "jolteon", "flareon"]);
    assert_eq!(mock.call_count(MockOp::Species), 1);
    assert_eq!(mock.call_count(MockOp::EvolutionChain), 1);
  }

  #[tokio::test]
  async fn test_tracker_no_evolution_data() {
    let mock = MockRemoteCatalog::new();
    mock.add_species(fixtures::species("missingno", None));
    let mock = Arc::new(mock);
    let resolver = resolver(&mock);

    let mut tracker = resolver.evolution_tracker("missingno");
    assert_eq!(tracker.settled().await, &EvolutionState::NoEvolutionData);
    assert_eq!(mock.call_count(MockOp::EvolutionChain), 0);
  }

  #[tokio::test]
  async fn test_tracker_species_failure() {
    let mock = eevee_mock();
    mock.fail_next(MockOp::Species, FetchError::NotFound("pokemon-species/eevee".into()));
    let resolver = resolver(&mock);

    let mut tracker = resolver.evolution_tracker("eevee");
    let state = tracker.settled().await;
    assert!(matches!(
      state,
      EvolutionState::Failed(EvolutionError {
        stage: EvolutionStage::Species,
        ..
      })
    ));
  }

  #[tokio::test]
  async fn test_tracker_retries_failed_species() {
    let mock = eevee_mock();
    mock.fail_next(MockOp::Species, FetchError::Network("timeout".into()));
    let resolver = resolver(&mock);

    let mut tracker = resolver.evolution_tracker("eevee");
    assert!(matches!(tracker.settled().await, EvolutionState::Failed(_)));

    assert!(tracker.retry());
    assert_eq!(tracker.state(), &EvolutionState::LoadingSpecies);
    assert!(matches!(tracker.settled().await, EvolutionState::Ready(l) if l.len() == 4));
    assert_eq!(mock.call_count(MockOp::Species), 2);
    assert!(!tracker.retry());
  }

  #[tokio::test]
  async fn test_tracker_refetch_retries_failed_chain() {
    let mock = eevee_mock();
    mock.fail_next(MockOp::EvolutionChain, FetchError::Network("timeout".into()));
    let resolver = resolver(&mock);

    let mut tracker = resolver.evolution_tracker("eevee");
    let state = tracker.settled().await.clone();
    assert!(matches!(
      state,
      EvolutionState::Failed(EvolutionError {
        stage: EvolutionStage::Chain,
        ..
      })
    ));

    // Re-triggering the tracker only re-issues the failed lineage lookup
    tracker.fetch();
    assert_eq!(tracker.state(), &EvolutionState::LoadingChain { id: 67 });
    assert!(matches!(tracker.settled().await, EvolutionState::Ready(_)));
    assert_eq!(mock.call_count(MockOp::Species), 1);
    assert_eq!(mock.call_count(MockOp::EvolutionChain), 2);
  }
}
