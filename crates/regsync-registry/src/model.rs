//! Typed records as the registry reports them, before translation into the
//! cache's data model.

use chrono::NaiveDate;
use regsync_core::{appointment::Role, entity::EntityStatus, person::BirthMonth};
use serde::Serialize;

use crate::Error;

/// Company profile as returned upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteCompany {
  pub entity_id:            String,
  pub name:                 String,
  pub status:               EntityStatus,
  pub legal_form:           Option<String>,
  pub incorporated_on:      Option<NaiveDate>,
  pub dissolved_on:         Option<NaiveDate>,
  pub jurisdiction:         Option<String>,
  pub registered_address:   Option<String>,
  pub classification_codes: Vec<String>,
}

/// An officer or controlling-person entry. Both lists share this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteOfficer {
  pub name:          String,
  pub role:          Role,
  pub appointed_on:  Option<NaiveDate>,
  pub ended_on:      Option<NaiveDate>,
  pub born:          Option<BirthMonth>,
  pub nationality:   Option<String>,
  pub address:       Option<String>,
  /// Registry identifier of a corporate controller.
  pub corporate_id:  Option<String>,
  /// Lower bound of the declared share-ownership band.
  pub ownership_pct: Option<f64>,
}

// ─── Partial results ─────────────────────────────────────────────────────────

/// Why one part of a composite fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
  pub status:  Option<u16>,
  pub message: String,
}

impl From<&Error> for FetchFailure {
  fn from(e: &Error) -> Self {
    Self {
      status:  e.status(),
      message: e.to_string(),
    }
  }
}

/// Outcome of one sub-fetch of a [`FullProfile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum SubFetch<T> {
  Fetched(T),
  Failed(FetchFailure),
}

impl<T> SubFetch<T> {
  pub fn ok(&self) -> Option<&T> {
    match self {
      Self::Fetched(v) => Some(v),
      Self::Failed(_) => None,
    }
  }

  pub fn failure(&self) -> Option<&FetchFailure> {
    match self {
      Self::Fetched(_) => None,
      Self::Failed(f) => Some(f),
    }
  }
}

impl<T> From<Result<T, Error>> for SubFetch<T> {
  fn from(r: Result<T, Error>) -> Self {
    match r {
      Ok(v) => Self::Fetched(v),
      Err(e) => Self::Failed(FetchFailure::from(&e)),
    }
  }
}

/// Entity, officers and controllers fetched together. Each part succeeds or
/// fails on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullProfile {
  pub entity_id:   String,
  /// `Fetched(None)` when the registry has no such entity.
  pub company:     SubFetch<Option<RemoteCompany>>,
  pub officers:    SubFetch<Vec<RemoteOfficer>>,
  pub controllers: SubFetch<Vec<RemoteOfficer>>,
}
