//! Domain records produced by the remote catalog.

use serde::{Deserialize, Serialize};

use crate::resource::IdResolver;

/// A `{name, url}` reference as returned by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
  pub name: String,
  pub url: String,
}

/// One offset-addressed slice of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
  /// Total remote catalog size
  pub count: u32,
  pub results: Vec<ResourceRef>,
  /// Continuation url, informational only; termination is decided by size
  pub next: Option<String>,
}

impl Page {
  /// A page shorter than the requested size is the last one.
  pub fn is_last(&self, page_size: u32) -> bool {
    (self.results.len() as u64) < u64::from(page_size)
  }

  /// Map references to entries, preserving order.
  ///
  /// References without a resolvable id are skipped.
  pub fn entries(&self, resolver: &IdResolver) -> Vec<CatalogEntry> {
    to_entries(&self.results, resolver)
  }
}

/// Map references to entries, preserving order and skipping unresolvable ids.
pub fn to_entries(refs: &[ResourceRef], resolver: &IdResolver) -> Vec<CatalogEntry> {
  refs
    .iter()
    .filter_map(|r| match resolver.resolve(&r.url) {
      Some(id) => Some(CatalogEntry {
        id,
        name: r.name.clone(),
      }),
      None => {
        tracing::warn!(name = %r.name, url = %r.url, "catalog reference without id skipped");
        None
      }
    })
    .collect()
}

/// Display entry of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
  pub id: u32,
  /// Unique lowercase slug
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSlot {
  pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitySlot {
  pub ability_name: String,
  pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
  pub stat_name: String,
  pub base_value: u32,
}

/// Full record of one entity, keyed by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
  pub id: u32,
  pub name: String,
  pub types: Vec<TypeSlot>,
  pub abilities: Vec<AbilitySlot>,
  pub stats: Vec<Stat>,
  /// Decimetres
  pub height: u32,
  /// Hectograms
  pub weight: u32,
  pub base_experience: Option<u32>,
}

impl DetailRecord {
  pub fn height_m(&self) -> f64 {
    f64::from(self.height) / 10.0
  }

  pub fn weight_kg(&self) -> f64 {
    f64::from(self.weight) / 10.0
  }

  pub fn type_names(&self) -> impl Iterator<Item = &str> {
    self.types.iter().map(|t| t.type_name.as_str())
  }
}

/// Taxonomic species record; exists to yield the evolution chain reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesRecord {
  pub name: String,
  pub evolution_chain_ref: Option<String>,
}

/// Node of an evolution lineage tree, as delivered by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EvolutionNode {
  #[serde(default)]
  pub species: Option<ResourceRef>,
  #[serde(default, rename = "evolves_to")]
  pub children: Vec<EvolutionNode>,
}

/// One form of a flattened evolution line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionEntry {
  pub id: u32,
  pub name: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn refs(n: u32) -> Vec<ResourceRef> {
    (1..=n)
      .map(|i| ResourceRef {
        name: format!("mon-{i}"),
        url: format!("https://pokeapi.co/api/v2/pokemon/{i}/"),
      })
      .collect()
  }

  #[test]
  fn test_short_page_is_last() {
    let page = Page {
      count: 10,
      results: refs(3),
      next: None,
    };
    assert!(page.is_last(4));
    assert!(!page.is_last(3));
  }

  #[test]
  fn test_entries_preserve_order_and_skip_unresolvable() {
    let mut results = refs(3);
    results.insert(
      1,
      ResourceRef {
        name: "broken".into(),
        url: "https://pokeapi.co/api/v2/pokemon/".into(),
      },
    );
    let page = Page {
      count: 4,
      results,
      next: None,
    };
    let entries = page.entries(&IdResolver::pokemon());
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["mon-1", "mon-2", "mon-3"]);
    assert_eq!(entries[0].id, 1);
  }

  #[test]
  fn test_units() {
    let record = DetailRecord {
      id: 25,
      name: "pikachu".into(),
      types: vec![TypeSlot {
        type_name: "electric".into(),
      }],
      abilities: vec![],
      stats: vec![],
      height: 4,
      weight: 60,
      base_experience: Some(112),
    };
    assert!((record.height_m() - 0.4).abs() < f64::EPSILON);
    assert!((record.weight_kg() - 6.0).abs() < f64::EPSILON);
    assert_eq!(record.type_names().collect::<Vec<_>>(), ["electric"]);
  }
}
