use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::error::FetchError;

use super::api_types::{ApiEvolutionChain, ApiPokemon, ApiResourceList, ApiSpecies};
use super::remote::RemoteCatalog;
use super::types::{DetailRecord, EvolutionNode, Page, SpeciesRecord};

/// PokéAPI v2 client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct PokeApiClient {
  client: Client,
  base_url: Url,
}

impl PokeApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base url {}: {}", config.base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("API base url cannot have paths appended: {}", base_url));
    }

    let mut builder = Client::builder().user_agent(concat!("pokesync/", env!("CARGO_PKG_VERSION")));
    if let Some(secs) = config.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Build `<base>/<segments...>/` with each segment percent-encoded.
  fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| FetchError::InvalidReference(self.base_url.to_string()))?
      .pop_if_empty()
      .extend(segments)
      .push("");
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    url: Url,
    query: &[(&str, String)],
  ) -> Result<T, FetchError> {
    debug!(%url, ?query, "GET");
    let response = self.client.get(url.clone()).query(query).send().await?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::from_status(status, url.as_str()));
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
  }
}

#[async_trait]
impl RemoteCatalog for PokeApiClient {
  async fn list_entries(&self, offset: u32, limit: u32) -> Result<Page, FetchError> {
    let url = self.endpoint(&["pokemon"])?;
    let list: ApiResourceList = self
      .get_json(
        url,
        &[("offset", offset.to_string()), ("limit", limit.to_string())],
      )
      .await?;
    Ok(list.into())
  }

  async fn detail_by_name(&self, name: &str) -> Result<DetailRecord, FetchError> {
    let url = self.endpoint(&["pokemon", name])?;
    let pokemon: ApiPokemon = self.get_json(url, &[]).await?;
    Ok(pokemon.into())
  }

  async fn species_by_name(&self, name: &str) -> Result<SpeciesRecord, FetchError> {
    let url = self.endpoint(&["pokemon-species", name])?;
    let species: ApiSpecies = self.get_json(url, &[]).await?;
    Ok(species.into())
  }

  async fn evolution_chain_by_id(&self, id: u32) -> Result<EvolutionNode, FetchError> {
    let url = self.endpoint(&["evolution-chain", &id.to_string()])?;
    let chain: ApiEvolutionChain = self.get_json(url, &[]).await?;
    Ok(chain.chain)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client(base: &str) -> PokeApiClient {
    PokeApiClient::new(&ApiConfig {
      base_url: base.to_string(),
      timeout_secs: None,
    })
    .unwrap()
  }

  #[test]
  fn test_endpoint_with_trailing_slash_base() {
    let c = client("https://pokeapi.co/api/v2/");
    let url = c.endpoint(&["pokemon", "mr-mime"]).unwrap();
    assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon/mr-mime/");
  }

  #[test]
  fn test_endpoint_without_trailing_slash_base() {
    let c = client("https://pokeapi.co/api/v2");
    let url = c.endpoint(&["evolution-chain", "67"]).unwrap();
    assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/evolution-chain/67/");
  }

  #[test]
  fn test_endpoint_escapes_names() {
    let c = client("https://pokeapi.co/api/v2/");
    let url = c.endpoint(&["pokemon", "a/b"]).unwrap();
    assert_eq!(url.as_str(), "https://pokeapi.co/api/v2/pokemon/a%2Fb/");
  }

  #[test]
  fn test_rejects_non_base_url() {
    let result = PokeApiClient::new(&ApiConfig {
      base_url: "mailto:ash@example.com".to_string(),
      timeout_secs: None,
    });
    assert!(result.is_err());
  }
}
