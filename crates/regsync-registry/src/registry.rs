//! The [`Registry`] trait — what the sync engine needs from the registry.

use std::future::Future;

use regsync_core::candidate::Candidate;

use crate::{
  Result,
  model::{FullProfile, RemoteCompany, RemoteOfficer},
};

/// Read access to the external registry.
///
/// Implementations normalise identifiers before use, map a 404 to `None` or
/// an empty list and never retry on their own.
pub trait Registry: Send + Sync {
  /// Search by name or identifier, at most `limit` hits.
  fn search<'a>(
    &'a self,
    term: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Candidate>>> + Send + 'a;

  fn get_entity<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Option<RemoteCompany>>> + Send + 'a;

  fn get_officers<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Vec<RemoteOfficer>>> + Send + 'a;

  fn get_controllers<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Vec<RemoteOfficer>>> + Send + 'a;

  /// Issue the three detail calls concurrently. A failing call is reported
  /// in its own slot and does not fail the others.
  fn get_full_profile<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = FullProfile> + Send + 'a {
    async move {
      let (company, officers, controllers) = tokio::join!(
        self.get_entity(entity_id),
        self.get_officers(entity_id),
        self.get_controllers(entity_id),
      );
      FullProfile {
        entity_id:   entity_id.to_owned(),
        company:     company.into(),
        officers:    officers.into(),
        controllers: controllers.into(),
      }
    }
  }

  /// Requests left in the current rate-limit window, if the implementation
  /// tracks one.
  fn remaining_budget(&self) -> impl Future<Output = Option<usize>> + Send + '_ {
    async { None }
  }
}
