//! Searching across the cache and the registry.

use std::{collections::HashSet, sync::Arc};

use regsync_core::{
  candidate::{Candidate, CandidateSource, SourcePreference, validate_term},
  entity::Entity,
  store::CacheStore,
};
use regsync_registry::Registry;
use serde::Serialize;

use crate::{Error, Result, synchronizer::Synchronizer};

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
  pub term:           String,
  pub source:         SourcePreference,
  pub limit:          usize,
  pub candidates:     Vec<Candidate>,
  /// Set when the registry failed but local hits were still returned.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub registry_error: Option<String>,
}

/// Concatenate, keep the first candidate per identifier, truncate.
///
/// `local` goes first, so a cached candidate always wins over a registry hit
/// for the same entity.
pub fn merge_candidates(
  local: Vec<Candidate>,
  remote: Vec<Candidate>,
  limit: usize,
) -> Vec<Candidate> {
  let mut seen = HashSet::new();
  local
    .into_iter()
    .chain(remote)
    .filter(|c| seen.insert(c.entity_id.clone()))
    .take(limit)
    .collect()
}

impl<S, R> Synchronizer<S, R>
where
  S: CacheStore + 'static,
  R: Registry,
{
  pub async fn search(
    &self,
    term: &str,
    limit: usize,
    source: SourcePreference,
  ) -> Result<SearchResults> {
    let term = validate_term(term)?;
    if limit == 0 {
      return Err(Error::Validation("limit must be at least 1".into()));
    }

    let (candidates, registry_error) = match source {
      SourcePreference::Local => (self.local_candidates(term, limit).await?, None),
      SourcePreference::Registry => {
        let remote = self.registry().search(term, limit).await?;
        self.seed(&remote);
        (merge_candidates(Vec::new(), remote, limit), None)
      }
      SourcePreference::Both => {
        let local = self.local_candidates(term, limit).await.unwrap_or_else(|e| {
          tracing::warn!(error = %e, "local search failed, using registry only");
          Vec::new()
        });
        if local.len() >= limit {
          tracing::debug!(hits = local.len(), "local search filled the limit");
          (merge_candidates(local, Vec::new(), limit), None)
        } else {
          // Registry hits often repeat local rows, so ask for the full limit
          // and let the merge drop duplicates.
          match self.registry().search(term, limit).await {
            Ok(remote) => {
              self.seed(&remote);
              (merge_candidates(local, remote, limit), None)
            }
            Err(e) if !local.is_empty() => {
              tracing::warn!(error = %e, "registry search failed, returning local hits");
              (local, Some(e.to_string()))
            }
            Err(e) => return Err(e.into()),
          }
        }
      }
    };

    Ok(SearchResults {
      term: term.to_owned(),
      source,
      limit,
      candidates,
      registry_error,
    })
  }

  async fn local_candidates(&self, term: &str, limit: usize) -> Result<Vec<Candidate>> {
    let hits = self
      .store()
      .search_entities(term, limit)
      .await
      .map_err(Error::store)?;
    Ok(hits.iter().map(|e| Candidate::from_entity(e, term)).collect())
  }

  /// Record registry hits in the background. Existing rows are left alone
  /// and the response does not wait.
  fn seed(&self, candidates: &[Candidate]) {
    let seeds: Vec<Entity> = candidates
      .iter()
      .filter(|c| c.source == CandidateSource::Registry)
      .map(Candidate::to_seed_entity)
      .collect();
    if seeds.is_empty() {
      return;
    }

    let store = Arc::clone(self.store());
    tokio::spawn(async move {
      for entity in seeds {
        let entity_id = entity.entity_id.clone();
        match store.seed_entity(entity).await {
          Ok(true) => tracing::debug!(%entity_id, "seeded entity from search hit"),
          Ok(false) => {}
          Err(e) => tracing::warn!(%entity_id, error = %e, "search seeding failed"),
        }
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use regsync_core::entity::EntityStatus;

  use super::*;

  fn candidate(id: &str, name: &str, source: CandidateSource) -> Candidate {
    Candidate {
      entity_id: id.into(),
      name: name.into(),
      status: EntityStatus::Active,
      incorporated_on: None,
      address_snippet: None,
      source,
      rank: None,
    }
  }

  #[test]
  fn local_wins_on_duplicate_identifier() {
    let local = vec![candidate("12345678", "TechCorp Limited", CandidateSource::Local)];
    let remote = vec![
      candidate("12345678", "TECHCORP LIMITED", CandidateSource::Registry),
      candidate("99999999", "Tech Innovators", CandidateSource::Registry),
    ];
    let merged = merge_candidates(local, remote, 10);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].source, CandidateSource::Local);
    assert_eq!(merged[0].name, "TechCorp Limited");
    assert_eq!(merged[1].entity_id, "99999999");
  }

  #[test]
  fn truncates_after_dedup() {
    let local = vec![candidate("12345678", "TechCorp Limited", CandidateSource::Local)];
    let remote = vec![candidate("99999999", "Tech Innovators", CandidateSource::Registry)];
    let merged = merge_candidates(local, remote, 1);
    assert_eq!(
      merged.iter().map(|c| c.entity_id.as_str()).collect::<Vec<_>>(),
      ["12345678"]
    );
  }

  #[test]
  fn duplicates_within_one_source_collapse() {
    let remote = vec![
      candidate("00000001", "A", CandidateSource::Registry),
      candidate("00000001", "A again", CandidateSource::Registry),
    ];
    assert_eq!(merge_candidates(Vec::new(), remote, 5).len(), 1);
  }
}
