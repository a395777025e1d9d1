//! Handlers for `GET /quota` and `GET /health`.

use axum::{Json, extract::State, http::StatusCode};
use regsync_core::{risk::RiskAnalyzer, store::CacheStore};
use regsync_registry::Registry;
use regsync_sync::{
  QuotaStatus, SyncService,
  service::{Health, HealthStatus},
};

use crate::{caller::CallerContext, error::ApiError};

/// `GET /quota` — today's usage for the calling account.
pub async fn quota<S, R, A>(
  State(service): State<SyncService<S, R, A>>,
  CallerContext(caller): CallerContext,
) -> Result<Json<QuotaStatus>, ApiError>
where
  S: CacheStore + 'static,
  R: Registry + 'static,
  A: RiskAnalyzer + 'static,
{
  Ok(Json(service.quota_status(&caller).await?))
}

/// `GET /health` — 503 when the store is unreachable.
pub async fn health<S, R, A>(
  State(service): State<SyncService<S, R, A>>,
) -> (StatusCode, Json<Health>)
where
  S: CacheStore + 'static,
  R: Registry + 'static,
  A: RiskAnalyzer + 'static,
{
  let health = service.health().await;
  let status = match health.status {
    HealthStatus::Ok => StatusCode::OK,
    HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
  };
  (status, Json(health))
}
