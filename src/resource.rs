//! Extraction of numeric identifiers from opaque resource references.
//!
//! The remote catalog never returns ids directly; every entry is a
//! `{name, url}` pair whose url ends in the numeric id, e.g.
//! `https://pokeapi.co/api/v2/pokemon/25/`. Evolution chains reference
//! species (`…/pokemon-species/25/`) and chains (`…/evolution-chain/10/`),
//! which is why the terminal pattern is configurable.
//!
//! Resolution is total: an unresolvable reference yields `None`, never a panic.

use regex_lite::Regex;

/// Terminal pattern an identifier must match.
#[derive(Debug, Clone)]
pub enum IdPattern {
  /// `…/pokemon/<digits>` with an optional trailing slash.
  Pokemon,
  /// Any `…/<digits>` with an optional trailing slash.
  Generic,
  /// A caller-supplied regex whose first capture group holds the digits.
  Custom(Regex),
}

/// Resolves identifiers under a fixed [`IdPattern`].
#[derive(Debug, Clone)]
pub struct IdResolver {
  pattern: IdPattern,
}

impl IdResolver {
  pub fn new(pattern: IdPattern) -> Self {
    Self { pattern }
  }

  /// Resolver for catalog listing references.
  pub fn pokemon() -> Self {
    Self::new(IdPattern::Pokemon)
  }

  /// Resolver for species and chain references.
  pub fn generic() -> Self {
    Self::new(IdPattern::Generic)
  }

  /// Build a resolver from a regex with one capture group.
  pub fn with_regex(pattern: &str) -> Result<Self, regex_lite::Error> {
    Ok(Self::new(IdPattern::Custom(Regex::new(pattern)?)))
  }

  /// Extract the identifier, or `None` when the reference does not end in a
  /// matching numeric segment.
  pub fn resolve(&self, reference: &str) -> Option<u32> {
    match &self.pattern {
      IdPattern::Pokemon => {
        let (parent, digits) = split_terminal(reference)?;
        if parent.rsplit('/').next() == Some("pokemon") {
          parse_id(digits)
        } else {
          None
        }
      }
      IdPattern::Generic => split_terminal(reference).and_then(|(_, digits)| parse_id(digits)),
      IdPattern::Custom(regex) => regex
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_id(m.as_str())),
    }
  }
}

impl Default for IdResolver {
  fn default() -> Self {
    Self::pokemon()
  }
}

/// Split `…/<parent>/<last>/` into (`…/<parent>`, `<last>`), requiring a
/// separator before the last segment.
fn split_terminal(reference: &str) -> Option<(&str, &str)> {
  let trimmed = reference.strip_suffix('/').unwrap_or(reference);
  let (parent, last) = trimmed.rsplit_once('/')?;
  Some((parent, last))
}

fn parse_id(digits: &str) -> Option<u32> {
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  digits.parse().ok()
}

/// Resolve a listing reference (`…/pokemon/<id>/`).
pub fn pokemon_id(reference: &str) -> Option<u32> {
  IdResolver::pokemon().resolve(reference)
}

/// Resolve any reference ending in a numeric segment.
pub fn generic_id(reference: &str) -> Option<u32> {
  IdResolver::generic().resolve(reference)
}
