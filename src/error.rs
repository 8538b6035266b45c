//! Error taxonomy shared by every query in the data layer.

use thiserror::Error;

/// Failure of a single query or mutation.
///
/// Errors are values scoped to one cache key: a failed page fetch never
/// touches the detail cache and vice versa. The type is `Clone` because one
/// in-flight fetch may be awaited by several deduplicated callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
  #[error("Network error: {0}")]
  Network(String),

  #[error("Unexpected status {code} from {url}")]
  Status { code: u16, url: String },

  #[error("Resource not found: {0}")]
  NotFound(String),

  #[error("Invalid response: {0}")]
  Decode(String),

  #[error("Reference has no numeric identifier: {0}")]
  InvalidReference(String),

  #[error("Favorites store error: {0}")]
  Storage(String),

  #[error("Fetch aborted before completion: {0}")]
  Aborted(String),
}

impl FetchError {
  /// Map a non-success HTTP status to an error.
  pub fn from_status(status: reqwest::StatusCode, url: &str) -> Self {
    match status.as_u16() {
      404 => FetchError::NotFound(url.to_string()),
      code => FetchError::Status {
        code,
        url: url.to_string(),
      },
    }
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      FetchError::Decode(err.to_string())
    } else if let Some(status) = err.status() {
      let url = err.url().map(|u| u.to_string()).unwrap_or_default();
      FetchError::from_status(status, &url)
    } else {
      FetchError::Network(err.to_string())
    }
  }
}

impl From<serde_json::Error> for FetchError {
  fn from(err: serde_json::Error) -> Self {
    FetchError::Decode(err.to_string())
  }
}

impl From<rusqlite::Error> for FetchError {
  fn from(err: rusqlite::Error) -> Self {
    FetchError::Storage(err.to_string())
  }
}
