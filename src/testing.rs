//! Mock remote catalog and fixtures for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::FetchError;
use crate::pokeapi::{
  DetailRecord, EvolutionNode, Page, RemoteCatalog, ResourceRef, SpeciesRecord, Stat, TypeSlot,
};

/// Remote operation, for call recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
  List,
  Detail,
  Species,
  EvolutionChain,
}

/// A recorded remote call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
  List { offset: u32, limit: u32 },
  Detail { name: String },
  Species { name: String },
  EvolutionChain { id: u32 },
}

impl RecordedCall {
  fn op(&self) -> MockOp {
    match self {
      RecordedCall::List { .. } => MockOp::List,
      RecordedCall::Detail { .. } => MockOp::Detail,
      RecordedCall::Species { .. } => MockOp::Species,
      RecordedCall::EvolutionChain { .. } => MockOp::EvolutionChain,
    }
  }
}

/// Mock implementation of the RemoteCatalog trait.
///
/// Provides controllable behavior for testing:
/// - Serve a generated catalog of `mon-1..=mon-N`
/// - Track calls for assertions
/// - Simulate one-shot failures per operation
/// - Delay every response to exercise in-flight states
#[derive(Debug, Default)]
pub struct MockRemoteCatalog {
  catalog: Mutex<Vec<ResourceRef>>,
  details: Mutex<HashMap<String, DetailRecord>>,
  species: Mutex<HashMap<String, SpeciesRecord>>,
  chains: Mutex<HashMap<u32, EvolutionNode>>,
  calls: Mutex<Vec<RecordedCall>>,
  failures: Mutex<HashMap<MockOp, VecDeque<FetchError>>>,
  delay: Mutex<Duration>,
}

impl MockRemoteCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Mock serving a catalog of `size` entries with ids `1..=size`.
  pub fn with_catalog(size: u32) -> Self {
    let mock = Self::new();
    *mock.catalog.lock().unwrap() = (1..=size).map(fixtures::listing_ref).collect();
    mock
  }

  pub fn with_delay(self, delay: Duration) -> Self {
    *self.delay.lock().unwrap() = delay;
    self
  }

  pub fn add_detail(&self, record: DetailRecord) {
    self
      .details
      .lock()
      .unwrap()
      .insert(record.name.clone(), record);
  }

  pub fn add_species(&self, species: SpeciesRecord) {
    self
      .species
      .lock()
      .unwrap()
      .insert(species.name.clone(), species);
  }

  pub fn add_chain(&self, id: u32, root: EvolutionNode) {
    self.chains.lock().unwrap().insert(id, root);
  }

  /// Make the next call of `op` fail with `error`.
  pub fn fail_next(&self, op: MockOp, error: FetchError) {
    self
      .failures
      .lock()
      .unwrap()
      .entry(op)
      .or_default()
      .push_back(error);
  }

  pub fn calls(&self) -> Vec<RecordedCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self, op: MockOp) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|c| c.op() == op)
      .count()
  }

  async fn record(&self, call: RecordedCall) -> Result<(), FetchError> {
    let op = call.op();
    self.calls.lock().unwrap().push(call);
    let delay = *self.delay.lock().unwrap();
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    match self.failures.lock().unwrap().get_mut(&op).and_then(|q| q.pop_front()) {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl RemoteCatalog for MockRemoteCatalog {
  async fn list_entries(&self, offset: u32, limit: u32) -> Result<Page, FetchError> {
    self.record(RecordedCall::List { offset, limit }).await?;
    let catalog = self.catalog.lock().unwrap();
    let start = (offset as usize).min(catalog.len());
    let end = start.saturating_add(limit as usize).min(catalog.len());
    Ok(Page {
      count: catalog.len() as u32,
      results: catalog[start..end].to_vec(),
      next: (end < catalog.len()).then(|| format!("offset={}&limit={}", end, limit)),
    })
  }

  async fn detail_by_name(&self, name: &str) -> Result<DetailRecord, FetchError> {
    self
      .record(RecordedCall::Detail {
        name: name.to_string(),
      })
      .await?;
    self
      .details
      .lock()
      .unwrap()
      .get(name)
      .cloned()
      .ok_or_else(|| FetchError::NotFound(format!("pokemon/{name}")))
  }

  async fn species_by_name(&self, name: &str) -> Result<SpeciesRecord, FetchError> {
    self
      .record(RecordedCall::Species {
        name: name.to_string(),
      })
      .await?;
    self
      .species
      .lock()
      .unwrap()
      .get(name)
      .cloned()
      .ok_or_else(|| FetchError::NotFound(format!("pokemon-species/{name}")))
  }

  async fn evolution_chain_by_id(&self, id: u32) -> Result<EvolutionNode, FetchError> {
    self.record(RecordedCall::EvolutionChain { id }).await?;
    self
      .chains
      .lock()
      .unwrap()
      .get(&id)
      .cloned()
      .ok_or_else(|| FetchError::NotFound(format!("evolution-chain/{id}")))
  }
}

/// Test fixtures.
pub mod fixtures {
  use super::*;

  pub const BASE: &str = "https://pokeapi.co/api/v2";

  pub fn listing_ref(id: u32) -> ResourceRef {
    ResourceRef {
      name: format!("mon-{id}"),
      url: format!("{BASE}/pokemon/{id}/"),
    }
  }

  pub fn species_ref(id: u32, name: &str) -> ResourceRef {
    ResourceRef {
      name: name.to_string(),
      url: format!("{BASE}/pokemon-species/{id}/"),
    }
  }

  pub fn chain_url(id: u32) -> String {
    format!("{BASE}/evolution-chain/{id}/")
  }

  pub fn node(id: u32, name: &str, children: Vec<EvolutionNode>) -> EvolutionNode {
    EvolutionNode {
      species: Some(species_ref(id, name)),
      children,
    }
  }

  pub fn detail(id: u32, name: &str) -> DetailRecord {
    DetailRecord {
      id,
      name: name.to_string(),
      types: vec![TypeSlot {
        type_name: "normal".to_string(),
      }],
      abilities: vec![],
      stats: vec![Stat {
        stat_name: "hp".to_string(),
        base_value: 50,
      }],
      height: 10,
      weight: 100,
      base_experience: Some(64),
    }
  }

  pub fn species(name: &str, chain_id: Option<u32>) -> SpeciesRecord {
    SpeciesRecord {
      name: name.to_string(),
      evolution_chain_ref: chain_id.map(chain_url),
    }
  }

  /// eevee → [vaporeon, jolteon, flareon]
  pub fn eevee_chain() -> EvolutionNode {
    node(
      133,
      "eevee",
      vec![
        node(134, "vaporeon", vec![]),
        node(135, "jolteon", vec![]),
        node(136, "flareon", vec![]),
      ],
    )
  }
}
