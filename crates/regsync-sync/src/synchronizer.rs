//! Per-request cache/registry arbitration for entity details.
//!
//! ```text
//! CheckLocal ─┬─ fresh ─────────────────────────────▶ Return (cache)
//!             └─ stale, missing or forced ─▶ FetchRemote
//!                  ├─ ok ──────▶ WriteBack ─────────▶ Return (registry)
//!                  └─ failed ─┬─ local exists ──────▶ Return (stale cache)
//!                             └─ no local ──────────▶ NotFound | Upstream
//! ```
//!
//! A record is only fresh for a request when every appointment list it asks
//! for was written back within the window too.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use regsync_core::{
  appointment::ResolvedAppointment,
  entity::{Entity, normalize_entity_id},
  relationship::Relationship,
  risk::RiskSummary,
  store::CacheStore,
};
use regsync_registry::{
  Registry,
  model::{RemoteCompany, RemoteOfficer, SubFetch},
};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  writeback::{
    controller_relationship, entity_from_remote, resolve_officer, write_appointments,
    write_entity, write_relationships,
  },
};

/// How long a synchronised record is trusted without asking the registry.
pub const DEFAULT_FRESHNESS_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetailOptions {
  pub force_refresh:       bool,
  pub include_officers:    bool,
  pub include_controllers: bool,
  pub include_risk:        bool,
}

impl DetailOptions {
  fn wants_appointments(&self) -> bool { self.include_officers || self.include_controllers }
}

/// Where the returned entity record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
  Cache,
  Registry,
  /// The registry could not be reached or no longer knows the entity; the
  /// cached record is served anyway.
  StaleCache,
}

/// A part of the details that could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartFailure {
  pub part:    &'static str,
  pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityDetails {
  pub entity:         Entity,
  pub origin:         Origin,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub officers:       Option<Vec<ResolvedAppointment>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub controllers:    Option<Vec<ResolvedAppointment>>,
  pub relationships:  Vec<Relationship>,
  /// Why a stale record was served.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sync_error:     Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub partial_errors: Vec<PartFailure>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub risk:           Option<RiskSummary>,
}

/// One registry round trip. Lists the caller did not ask for are `None`.
struct Fetched {
  company:     SubFetch<Option<RemoteCompany>>,
  officers:    Option<SubFetch<Vec<RemoteOfficer>>>,
  controllers: Option<SubFetch<Vec<RemoteOfficer>>>,
}

/// Officers and controllers are stored together and told apart by role.
fn split_roles(
  appointments: Vec<ResolvedAppointment>,
) -> (Vec<ResolvedAppointment>, Vec<ResolvedAppointment>) {
  appointments
    .into_iter()
    .partition(|a| !a.appointment.role.is_control())
}

pub struct Synchronizer<S, R> {
  store:     Arc<S>,
  registry:  Arc<R>,
  freshness: Duration,
}

impl<S: CacheStore, R: Registry> Synchronizer<S, R> {
  pub fn new(store: Arc<S>, registry: Arc<R>, freshness: Duration) -> Self {
    Self { store, registry, freshness }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn registry(&self) -> &Arc<R> { &self.registry }

  pub fn freshness(&self) -> Duration { self.freshness }

  /// Resolve an entity, consulting the registry only when the cache cannot
  /// answer.
  pub async fn details(&self, raw_id: &str, opts: DetailOptions) -> Result<EntityDetails> {
    let id = normalize_entity_id(raw_id)?;
    self.details_at(&id, opts, Utc::now()).await
  }

  pub async fn details_at(
    &self,
    id: &str,
    opts: DetailOptions,
    now: DateTime<Utc>,
  ) -> Result<EntityDetails> {
    let local = match self.store.get_entity(id).await {
      Ok(found) => found,
      Err(e) => {
        tracing::warn!(entity_id = id, error = %e, "cache read failed, treating as missing");
        None
      }
    };

    if !opts.force_refresh {
      let fresh = local.as_ref().filter(|e| {
        e.covers(opts.include_officers, opts.include_controllers, self.freshness, now)
      });
      if let Some(entity) = fresh {
        tracing::debug!(entity_id = id, "serving fresh cache entry");
        return Ok(self.from_cache(entity.clone(), Origin::Cache, None, opts).await);
      }
    }

    tracing::info!(
      entity_id = id,
      cached = local.is_some(),
      forced = opts.force_refresh,
      "fetching entity from registry"
    );
    let fetched = self.fetch(id, opts).await;

    match fetched.company {
      SubFetch::Fetched(Some(remote)) => {
        let lists = (fetched.officers, fetched.controllers);
        Ok(self.write_through(id, local.as_ref(), remote, lists, opts, now).await)
      }
      SubFetch::Fetched(None) => match local {
        Some(entity) => {
          tracing::warn!(entity_id = id, "entity absent upstream, serving cached record");
          let reason = "entity not found in registry".to_owned();
          Ok(self.from_cache(entity, Origin::StaleCache, Some(reason), opts).await)
        }
        None => Err(Error::NotFound(id.to_owned())),
      },
      SubFetch::Failed(failure) => match local {
        Some(entity) => {
          tracing::warn!(
            entity_id = id,
            error = %failure.message,
            "registry fetch failed, serving stale cache entry"
          );
          Ok(self.from_cache(entity, Origin::StaleCache, Some(failure.message), opts).await)
        }
        None => Err(Error::Upstream {
          status:  failure.status,
          message: failure.message,
        }),
      },
    }
  }

  /// The record plus only the appointment lists the caller asked for, all
  /// requested concurrently.
  async fn fetch(&self, id: &str, opts: DetailOptions) -> Fetched {
    let officers = async {
      if opts.include_officers {
        Some(SubFetch::from(self.registry.get_officers(id).await))
      } else {
        None
      }
    };
    let controllers = async {
      if opts.include_controllers {
        Some(SubFetch::from(self.registry.get_controllers(id).await))
      } else {
        None
      }
    };
    let (company, officers, controllers) =
      tokio::join!(self.registry.get_entity(id), officers, controllers);

    Fetched {
      company: company.into(),
      officers,
      controllers,
    }
  }

  async fn write_through(
    &self,
    id: &str,
    local: Option<&Entity>,
    remote: RemoteCompany,
    (officers, controllers): (
      Option<SubFetch<Vec<RemoteOfficer>>>,
      Option<SubFetch<Vec<RemoteOfficer>>>,
    ),
    opts: DetailOptions,
    now: DateTime<Utc>,
  ) -> EntityDetails {
    // Keep appointments keyed by the id we were asked for, even if the
    // registry echoes it differently.
    let mut entity = entity_from_remote(remote, now);
    entity.entity_id = id.to_owned();
    // List stamps only move once that list has been written again.
    if let Some(prior) = local {
      entity.officers_synced_at = prior.officers_synced_at;
      entity.controllers_synced_at = prior.controllers_synced_at;
    }
    let entity_written = write_entity(&*self.store, &entity).await;

    let mut partial_errors = Vec::new();
    let mut cached: Option<Vec<ResolvedAppointment>> = None;
    let mut restamp = false;

    let officers = match officers {
      None => Vec::new(),
      Some(SubFetch::Fetched(list)) => {
        let resolved: Vec<_> = list.iter().map(|o| resolve_officer(id, o)).collect();
        if entity_written && write_appointments(&*self.store, &resolved).await {
          entity.officers_synced_at = Some(now);
          restamp = true;
        }
        resolved
      }
      Some(SubFetch::Failed(f)) => {
        partial_errors.push(PartFailure { part: "officers", message: f.message });
        let (officers, _) = split_roles(self.cached_appointments(id, &mut cached).await);
        officers
      }
    };

    let controllers = match controllers {
      None => Vec::new(),
      Some(SubFetch::Fetched(list)) => {
        let resolved: Vec<_> = list.iter().map(|o| resolve_officer(id, o)).collect();
        let links: Vec<_> = list
          .iter()
          .filter_map(|o| controller_relationship(id, o))
          .collect();
        if entity_written && write_appointments(&*self.store, &resolved).await {
          entity.controllers_synced_at = Some(now);
          restamp = true;
        }
        write_relationships(&*self.store, &links).await;
        resolved
      }
      Some(SubFetch::Failed(f)) => {
        partial_errors.push(PartFailure { part: "controllers", message: f.message });
        let (_, controllers) = split_roles(self.cached_appointments(id, &mut cached).await);
        controllers
      }
    };

    if restamp {
      write_entity(&*self.store, &entity).await;
    }

    EntityDetails {
      relationships: self.relationships(id).await,
      entity,
      origin: Origin::Registry,
      officers: opts.include_officers.then_some(officers),
      controllers: opts.include_controllers.then_some(controllers),
      sync_error: None,
      partial_errors,
      risk: None,
    }
  }

  async fn from_cache(
    &self,
    entity: Entity,
    origin: Origin,
    sync_error: Option<String>,
    opts: DetailOptions,
  ) -> EntityDetails {
    let mut partial_errors = Vec::new();
    let (officers, controllers) = if opts.wants_appointments() {
      match self.store.appointments_for(&entity.entity_id).await {
        Ok(all) => split_roles(all),
        Err(e) => {
          tracing::warn!(entity_id = %entity.entity_id, error = %e, "cached appointments unreadable");
          partial_errors.push(PartFailure {
            part:    "appointments",
            message: e.to_string(),
          });
          (Vec::new(), Vec::new())
        }
      }
    } else {
      (Vec::new(), Vec::new())
    };

    EntityDetails {
      relationships: self.relationships(&entity.entity_id).await,
      entity,
      origin,
      officers: opts.include_officers.then_some(officers),
      controllers: opts.include_controllers.then_some(controllers),
      sync_error,
      partial_errors,
      risk: None,
    }
  }

  /// Read the cached appointments at most once per request.
  async fn cached_appointments(
    &self,
    id: &str,
    memo: &mut Option<Vec<ResolvedAppointment>>,
  ) -> Vec<ResolvedAppointment> {
    if let Some(all) = memo {
      return all.clone();
    }
    let all = self.store.appointments_for(id).await.unwrap_or_else(|e| {
      tracing::warn!(entity_id = id, error = %e, "cached appointments unreadable");
      Vec::new()
    });
    *memo = Some(all.clone());
    all
  }

  async fn relationships(&self, id: &str) -> Vec<Relationship> {
    self.store.relationships_for(id).await.unwrap_or_else(|e| {
      tracing::warn!(entity_id = id, error = %e, "cached relationships unreadable");
      Vec::new()
    })
  }
}
