//! The `CacheStore` trait — the authoritative local copy of registry data.
//!
//! The trait is implemented by storage backends (e.g. `regsync-store-sqlite`).
//! The sync engine depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  appointment::{Appointment, ResolvedAppointment},
  entity::Entity,
  person::Person,
  relationship::Relationship,
};

// ─── Supporting types ────────────────────────────────────────────────────────

/// Outcome of [`CacheStore::admit_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Admission {
  /// The request was logged; `used` includes it.
  Admitted { used: u32 },
  /// The ceiling was already reached; nothing was logged.
  Denied { used: u32 },
}

/// Row counts, reported by health checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
  pub entities:      u64,
  pub persons:       u64,
  pub appointments:  u64,
  pub relationships: u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a cache store backend.
///
/// Every write is idempotent and keyed by a natural or composite key, so
/// replaying the same registry fetch never duplicates rows and concurrent
/// writers converge.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CacheStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Retrieve an entity by its normalised identifier. Returns `None` if not
  /// cached.
  fn get_entity<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + 'a;

  /// Insert or fully overwrite an entity.
  fn upsert_entity(
    &self,
    entity: Entity,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert an entity only if no row with its identifier exists. Returns
  /// whether a row was written.
  fn seed_entity(
    &self,
    entity: Entity,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Case-insensitive match on name or identifier.
  ///
  /// Exact identifier matches and name-prefix matches sort first, then the
  /// rest; ties are broken alphabetically by name.
  fn search_entities<'a>(
    &'a self,
    term: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  // ── People and appointments ───────────────────────────────────────────

  /// Insert or fully overwrite a person, keyed by `person_key`.
  fn upsert_person(
    &self,
    person: Person,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert an appointment. A collision on the composite key is a no-op;
  /// returns whether a row was written.
  fn upsert_appointment(
    &self,
    appointment: Appointment,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All appointments for an entity, each joined with its person.
  fn appointments_for<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Vec<ResolvedAppointment>, Self::Error>> + Send + 'a;

  // ── Relationships ─────────────────────────────────────────────────────

  /// Insert or overwrite a relationship, keyed by `(from, to, type)`.
  fn upsert_relationship(
    &self,
    relationship: Relationship,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Relationships where the entity is on either end.
  fn relationships_for<'a>(
    &'a self,
    entity_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Relationship>, Self::Error>> + Send + 'a;

  // ── Request log ───────────────────────────────────────────────────────

  /// Count requests logged for `caller` at or after `since`.
  fn count_requests<'a>(
    &'a self,
    caller: &'a str,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + 'a;

  /// Count the caller's requests since `since` and, if below `ceiling`
  /// (`None` = unlimited), log one at `at`. Counting and logging happen in
  /// one critical section. Log rows older than `since`, for any caller, may
  /// be discarded.
  fn admit_request<'a>(
    &'a self,
    caller: &'a str,
    at: DateTime<Utc>,
    since: DateTime<Utc>,
    ceiling: Option<u32>,
  ) -> impl Future<Output = Result<Admission, Self::Error>> + Send + 'a;

  // ── Health ────────────────────────────────────────────────────────────

  fn stats(&self) -> impl Future<Output = Result<StoreStats, Self::Error>> + Send + '_;
}
