//! Handler for `GET /companies/{id}`.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use regsync_core::{risk::RiskAnalyzer, store::CacheStore};
use regsync_registry::Registry;
use regsync_sync::{DetailOptions, EntityDetails, SyncService};

use crate::{caller::CallerContext, error::ApiError};

/// `GET /companies/{id}[?force_refresh=true][&include_officers=true][&include_controllers=true][&include_risk=true]`
pub async fn get_one<S, R, A>(
  State(service): State<SyncService<S, R, A>>,
  CallerContext(caller): CallerContext,
  Path(id): Path<String>,
  Query(options): Query<DetailOptions>,
) -> Result<Json<EntityDetails>, ApiError>
where
  S: CacheStore + 'static,
  R: Registry + 'static,
  A: RiskAnalyzer + 'static,
{
  Ok(Json(service.get_details(&caller, &id, options).await?))
}
