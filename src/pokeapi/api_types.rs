//! Serde-deserializable types matching PokéAPI v2 responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;

use super::types::{
  AbilitySlot, DetailRecord, EvolutionNode, Page, ResourceRef, SpeciesRecord, Stat, TypeSlot,
};

// ============================================================================
// Listing endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiResourceList {
  #[serde(default)]
  pub count: u32,
  pub next: Option<String>,
  #[serde(default)]
  pub results: Vec<ResourceRef>,
}

// ============================================================================
// Pokemon endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiNamed {
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiTypeSlot {
  #[serde(rename = "type")]
  pub kind: ApiNamed,
}

#[derive(Debug, Deserialize)]
pub struct ApiAbilitySlot {
  pub ability: ApiNamed,
  #[serde(default)]
  pub is_hidden: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiStat {
  pub base_stat: u32,
  pub stat: ApiNamed,
}

#[derive(Debug, Deserialize)]
pub struct ApiPokemon {
  pub id: u32,
  pub name: String,
  #[serde(default)]
  pub types: Vec<ApiTypeSlot>,
  #[serde(default)]
  pub abilities: Vec<ApiAbilitySlot>,
  #[serde(default)]
  pub stats: Vec<ApiStat>,
  #[serde(default)]
  pub height: u32,
  #[serde(default)]
  pub weight: u32,
  pub base_experience: Option<u32>,
}

// ============================================================================
// Species and evolution chain responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUrl {
  pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiSpecies {
  pub name: String,
  pub evolution_chain: Option<ApiUrl>,
}

#[derive(Debug, Deserialize)]
pub struct ApiEvolutionChain {
  pub chain: EvolutionNode,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiResourceList> for Page {
  fn from(list: ApiResourceList) -> Self {
    Page {
      count: list.count,
      results: list.results,
      next: list.next,
    }
  }
}

impl From<ApiPokemon> for DetailRecord {
  fn from(p: ApiPokemon) -> Self {
    DetailRecord {
      id: p.id,
      name: p.name,
      types: p
        .types
        .into_iter()
        .map(|t| TypeSlot {
          type_name: t.kind.name,
        })
        .collect(),
      abilities: p
        .abilities
        .into_iter()
        .map(|a| AbilitySlot {
          ability_name: a.ability.name,
          is_hidden: a.is_hidden,
        })
        .collect(),
      stats: p
        .stats
        .into_iter()
        .map(|s| Stat {
          stat_name: s.stat.name,
          base_value: s.base_stat,
        })
        .collect(),
      height: p.height,
      weight: p.weight,
      base_experience: p.base_experience,
    }
  }
}

impl From<ApiSpecies> for SpeciesRecord {
  fn from(s: ApiSpecies) -> Self {
    SpeciesRecord {
      name: s.name,
      // An empty url is as good as none
      evolution_chain_ref: s.evolution_chain.map(|c| c.url).filter(|u| !u.is_empty()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_resource_list() {
    let json = r#"{
      "count": 1302,
      "next": "https://pokeapi.co/api/v2/pokemon?offset=2&limit=2",
      "previous": null,
      "results": [
        {"name": "bulbasaur", "url": "https://pokeapi.co/api/v2/pokemon/1/"},
        {"name": "ivysaur", "url": "https://pokeapi.co/api/v2/pokemon/2/"}
      ]
    }"#;
    let page: Page = serde_json::from_str::<ApiResourceList>(json).unwrap().into();
    assert_eq!(page.count, 1302);
    assert_eq!(page.results.len(), 2);
    assert_eq!(page.results[1].name, "ivysaur");
    assert!(page.next.is_some());
  }

  #[test]
  fn test_parse_pokemon() {
    let json = r#"{
      "id": 25,
      "name": "pikachu",
      "height": 4,
      "weight": 60,
      "base_experience": 112,
      "types": [{"slot": 1, "type": {"name": "electric", "url": "https://pokeapi.co/api/v2/type/13/"}}],
      "abilities": [
        {"ability": {"name": "static", "url": "u"}, "is_hidden": false, "slot": 1},
        {"ability": {"name": "lightning-rod", "url": "u"}, "is_hidden": true, "slot": 3}
      ],
      "stats": [{"base_stat": 35, "effort": 0, "stat": {"name": "hp", "url": "u"}}],
      "sprites": {"front_default": "ignored"}
    }"#;
    let record: DetailRecord = serde_json::from_str::<ApiPokemon>(json).unwrap().into();
    assert_eq!(record.id, 25);
    assert_eq!(record.types[0].type_name, "electric");
    assert_eq!(record.abilities.len(), 2);
    assert!(record.abilities[1].is_hidden);
    assert_eq!(record.stats[0].stat_name, "hp");
    assert_eq!(record.stats[0].base_value, 35);
    assert_eq!(record.base_experience, Some(112));
  }

  #[test]
  fn test_parse_species_without_chain() {
    let json = r#"{"name": "missingno", "evolution_chain": null}"#;
    let species: SpeciesRecord = serde_json::from_str::<ApiSpecies>(json).unwrap().into();
    assert_eq!(species.evolution_chain_ref, None);
  }

  #[test]
  fn test_parse_evolution_chain() {
    let json = r#"{
      "id": 67,
      "baby_trigger_item": null,
      "chain": {
        "is_baby": false,
        "species": {"name": "eevee", "url": "https://pokeapi.co/api/v2/pokemon-species/133/"},
        "evolution_details": [],
        "evolves_to": [
          {"species": {"name": "vaporeon", "url": "https://pokeapi.co/api/v2/pokemon-species/134/"}, "evolves_to": []},
          {"species": {"name": "jolteon", "url": "https://pokeapi.co/api/v2/pokemon-species/135/"}}
        ]
      }
    }"#;
    let chain: ApiEvolutionChain = serde_json::from_str(json).unwrap();
    assert_eq!(chain.chain.species.as_ref().unwrap().name, "eevee");
    assert_eq!(chain.chain.children.len(), 2);
    assert!(chain.chain.children[1].children.is_empty());
  }
}
