//! Search candidates — ephemeral rows returned by a search, never stored as
//! such.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entity::{Entity, EntityStatus},
};

/// Longest accepted search term, after trimming.
pub const MAX_TERM_LEN: usize = 200;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
  Local,
  Registry,
}

/// Which sources a search consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePreference {
  Local,
  Registry,
  #[default]
  Both,
}

impl std::str::FromStr for SourcePreference {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "local" | "cache" => Ok(Self::Local),
      "registry" | "remote" => Ok(Self::Registry),
      "both" => Ok(Self::Both),
      other => Err(Error::UnknownSource(other.to_owned())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
  pub entity_id:       String,
  pub name:            String,
  pub status:          EntityStatus,
  pub incorporated_on: Option<NaiveDate>,
  pub address_snippet: Option<String>,
  pub source:          CandidateSource,
  /// Relevance hint in `0.0..=1.0`; higher is better.
  pub rank:            Option<f64>,
}

impl Candidate {
  /// Build a local candidate from a cached entity, ranked against `term`.
  pub fn from_entity(entity: &Entity, term: &str) -> Self {
    Self {
      entity_id:       entity.entity_id.clone(),
      name:            entity.name.clone(),
      status:          entity.status,
      incorporated_on: entity.incorporated_on,
      address_snippet: entity.registered_address.clone(),
      source:          CandidateSource::Local,
      rank:            Some(match_score(&entity.name, term)),
    }
  }

  /// The seed row written back for a registry hit. It carries no sync
  /// timestamp so it is treated as stale on first detail request.
  pub fn to_seed_entity(&self) -> Entity {
    let mut entity = Entity::new(self.entity_id.clone(), self.name.clone());
    entity.status = self.status;
    entity.incorporated_on = self.incorporated_on;
    entity.registered_address = self.address_snippet.clone();
    entity
  }
}

/// Trim and bound a search term.
pub fn validate_term(term: &str) -> Result<&str> {
  let term = term.trim();
  if term.is_empty() {
    return Err(Error::InvalidTerm("term is empty".into()));
  }
  if term.chars().count() > MAX_TERM_LEN {
    return Err(Error::InvalidTerm(format!(
      "term longer than {MAX_TERM_LEN} characters"
    )));
  }
  Ok(term)
}

/// Similarity between a company name and a query: exact 1.0, prefix 0.9,
/// substring 0.7, otherwise a share of matching words scaled to 0.6.
pub fn match_score(name: &str, query: &str) -> f64 {
  let name_lower = name.to_lowercase();
  let query_lower = query.trim().to_lowercase();

  if name_lower == query_lower {
    return 1.0;
  }
  if name_lower.starts_with(&query_lower) {
    return 0.9;
  }
  if name_lower.contains(&query_lower) {
    return 0.7;
  }

  let name_words: HashSet<_> = name_lower.split_whitespace().collect();
  let query_words: HashSet<_> = query_lower.split_whitespace().collect();
  if query_words.is_empty() {
    return 0.0;
  }

  let matching = name_words.intersection(&query_words).count();
  (matching as f64) / (query_words.len() as f64) * 0.6
}
