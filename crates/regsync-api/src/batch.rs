//! Handler for `POST /batch`.
//!
//! Per-item failures are reported inside a 200 response; only errors that
//! reject the batch as a whole (tier, size, quota) produce an error status.

use axum::{Json, extract::State};
use regsync_core::{risk::RiskAnalyzer, store::CacheStore};
use regsync_registry::Registry;
use regsync_sync::{
  SyncService,
  batch::{BatchReport, BatchRequest},
};

use crate::{caller::CallerContext, error::ApiError};

pub async fn handler<S, R, A>(
  State(service): State<SyncService<S, R, A>>,
  CallerContext(caller): CallerContext,
  Json(request): Json<BatchRequest>,
) -> Result<Json<BatchReport>, ApiError>
where
  S: CacheStore + 'static,
  R: Registry + 'static,
  A: RiskAnalyzer + 'static,
{
  Ok(Json(service.batch(&caller, request).await?))
}
