//! [`SyncService`] — the operations exposed to callers.
//!
//! Each operation validates its input, passes the quota gate and then runs
//! under the caller-level deadline. Dropping the deadline future cancels any
//! in-flight registry call and any pending rate-limiter wait.

use std::{future::Future, sync::Arc, time::Duration};

use regsync_core::{
  candidate::{SourcePreference, validate_term},
  entity::normalize_entity_id,
  risk::{EntitySnapshot, RiskAnalyzer},
  store::{CacheStore, StoreStats},
};
use regsync_registry::Registry;
use serde::Serialize;

use crate::{
  Error, Result,
  batch::{BatchOperation, BatchReport, BatchRequest, run_bounded},
  error::QuotaScope,
  merge::SearchResults,
  quota::{Caller, QuotaGate, QuotaStatus},
  synchronizer::{DEFAULT_FRESHNESS_HOURS, DetailOptions, EntityDetails, PartFailure, Synchronizer},
};

#[derive(Debug, Clone)]
pub struct SyncConfig {
  pub freshness:         chrono::Duration,
  pub request_timeout:   Duration,
  pub batch_concurrency: usize,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      freshness:         chrono::Duration::hours(DEFAULT_FRESHNESS_HOURS),
      request_timeout:   Duration::from_secs(60),
      batch_concurrency: 4,
    }
  }
}

// ─── Health ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
  Ok,
  Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
  pub reachable: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub counts:    Option<StoreStats>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error:     Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryHealth {
  /// Requests left in the current rate-limit window.
  pub remaining_budget: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
  pub status:   HealthStatus,
  pub store:    StoreHealth,
  pub registry: RegistryHealth,
}

// ─── Search request ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SearchRequest {
  pub term:   String,
  /// Defaults to the tier's result ceiling.
  pub limit:  Option<usize>,
  pub source: SourcePreference,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct SyncService<S, R, A> {
  sync:   Arc<Synchronizer<S, R>>,
  quota:  QuotaGate<S>,
  risk:   Arc<A>,
  config: SyncConfig,
}

impl<S, R, A> Clone for SyncService<S, R, A> {
  fn clone(&self) -> Self {
    Self {
      sync:   Arc::clone(&self.sync),
      quota:  self.quota.clone(),
      risk:   Arc::clone(&self.risk),
      config: self.config.clone(),
    }
  }
}

impl<S, R, A> SyncService<S, R, A>
where
  S: CacheStore + 'static,
  R: Registry + 'static,
  A: RiskAnalyzer + 'static,
{
  pub fn new(store: Arc<S>, registry: Arc<R>, risk: A, config: SyncConfig) -> Self {
    Self {
      sync: Arc::new(Synchronizer::new(Arc::clone(&store), registry, config.freshness)),
      quota: QuotaGate::new(store),
      risk: Arc::new(risk),
      config,
    }
  }

  pub fn config(&self) -> &SyncConfig { &self.config }

  async fn deadline<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
    let limit = self.config.request_timeout;
    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
      tracing::warn!(timeout_ms = limit.as_millis() as u64, "operation deadline expired");
      Err(Error::Timeout(limit))
    })
  }

  // ── search ────────────────────────────────────────────────────────────

  pub async fn search(&self, caller: &Caller, req: SearchRequest) -> Result<SearchResults> {
    let term = validate_term(&req.term)?.to_owned();
    if req.limit == Some(0) {
      return Err(Error::Validation("limit must be at least 1".into()));
    }
    let limit = caller
      .tier
      .cap_results(req.limit.unwrap_or(caller.tier.limits().max_results));

    self.quota.admit(caller).await?;
    self
      .deadline(self.sync.search(&term, limit, req.source))
      .await
  }

  // ── details ───────────────────────────────────────────────────────────

  pub async fn get_details(
    &self,
    caller: &Caller,
    raw_id: &str,
    opts: DetailOptions,
  ) -> Result<EntityDetails> {
    let id = normalize_entity_id(raw_id)?;
    self.quota.admit(caller).await?;
    self
      .deadline(async {
        let mut details = self.sync.details(&id, opts).await?;
        if opts.include_risk {
          self.attach_risk(&mut details).await;
        }
        Ok(details)
      })
      .await
  }

  /// Ask the collaborator for a risk summary. Failure leaves `risk` empty.
  async fn attach_risk(&self, details: &mut EntityDetails) {
    let mut appointments: Vec<_> = details
      .officers
      .iter()
      .chain(details.controllers.iter())
      .flatten()
      .cloned()
      .collect();
    if details.officers.is_none() && details.controllers.is_none() {
      appointments = self
        .sync
        .store()
        .appointments_for(&details.entity.entity_id)
        .await
        .unwrap_or_default();
    }

    let snapshot = EntitySnapshot {
      entity: details.entity.clone(),
      appointments,
      relationships: details.relationships.clone(),
    };
    match self.risk.assess(&snapshot).await {
      Ok(summary) => details.risk = Some(summary),
      Err(e) => {
        tracing::warn!(entity_id = %details.entity.entity_id, error = %e, "risk analysis skipped");
        details.partial_errors.push(PartFailure {
          part:    "risk",
          message: e.to_string(),
        });
      }
    }
  }

  // ── batch ─────────────────────────────────────────────────────────────

  /// The whole batch counts as one request against the daily quota.
  pub async fn batch(&self, caller: &Caller, req: BatchRequest) -> Result<BatchReport> {
    let Some(max_batch) = caller.tier.limits().max_batch else {
      return Err(Error::FeatureNotAvailable {
        tier:    caller.tier,
        feature: "batch",
      });
    };
    if req.items.is_empty() {
      return Err(Error::Validation("batch has no items".into()));
    }
    if req.items.len() > max_batch {
      return Err(Error::QuotaExceeded {
        tier:    caller.tier,
        scope:   QuotaScope::BatchSize,
        used:    u32::try_from(req.items.len()).unwrap_or(u32::MAX),
        ceiling: u32::try_from(max_batch).unwrap_or(u32::MAX),
      });
    }
    if req.options.limit == Some(0) {
      return Err(Error::Validation("limit must be at least 1".into()));
    }

    self.quota.admit(caller).await?;
    tracing::info!(
      caller = %caller.id,
      operation = ?req.operation,
      items = req.items.len(),
      "running batch"
    );

    let concurrency = self.config.batch_concurrency;
    let results = match req.operation {
      BatchOperation::Search => {
        let limit = caller
          .tier
          .cap_results(req.options.limit.unwrap_or(caller.tier.limits().max_results));
        let source = req.options.source;
        run_bounded(req.items, concurrency, |term| {
          let svc = self.clone();
          async move { svc.deadline(svc.sync.search(&term, limit, source)).await }
        })
        .await
      }
      BatchOperation::Details => {
        let opts = req.options.detail_options();
        run_bounded(req.items, concurrency, |id| {
          let svc = self.clone();
          async move { svc.deadline(svc.sync.details(&id, opts)).await }
        })
        .await
      }
    };

    let report = BatchReport::new(req.operation, results);
    tracing::info!(
      caller = %caller.id,
      succeeded = report.summary.succeeded,
      failed = report.summary.failed,
      "batch finished"
    );
    Ok(report)
  }

  // ── quota and health ──────────────────────────────────────────────────

  /// Usage so far today. Does not count as a request.
  pub async fn quota_status(&self, caller: &Caller) -> Result<QuotaStatus> {
    self.quota.status(caller).await
  }

  pub async fn health(&self) -> Health {
    let store = match self.sync.store().stats().await {
      Ok(counts) => StoreHealth {
        reachable: true,
        counts:    Some(counts),
        error:     None,
      },
      Err(e) => {
        tracing::warn!(error = %e, "store health check failed");
        StoreHealth {
          reachable: false,
          counts:    None,
          error:     Some(e.to_string()),
        }
      }
    };
    let registry = RegistryHealth {
      remaining_budget: self.sync.registry().remaining_budget().await,
    };

    Health {
      status: if store.reachable { HealthStatus::Ok } else { HealthStatus::Degraded },
      store,
      registry,
    }
  }
}
