//! Handler for `GET /search`.

use axum::{
  Json,
  extract::{Query, State},
};
use regsync_core::{candidate::SourcePreference, risk::RiskAnalyzer, store::CacheStore};
use regsync_registry::Registry;
use regsync_sync::{SyncService, merge::SearchResults, service::SearchRequest};
use serde::Deserialize;

use crate::{caller::CallerContext, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  /// Name fragment or registry identifier.
  pub term:   String,
  /// Defaults to the tier's result ceiling.
  pub limit:  Option<usize>,
  /// `local`, `registry` or `both` (default).
  pub source: Option<String>,
}

/// `GET /search?term=...[&limit=...][&source=...]`
pub async fn handler<S, R, A>(
  State(service): State<SyncService<S, R, A>>,
  CallerContext(caller): CallerContext,
  Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, ApiError>
where
  S: CacheStore + 'static,
  R: Registry + 'static,
  A: RiskAnalyzer + 'static,
{
  let source = match params.source.as_deref() {
    Some(s) => s
      .parse::<SourcePreference>()
      .map_err(|e| ApiError::BadRequest(e.to_string()))?,
    None => SourcePreference::default(),
  };

  let request = SearchRequest {
    term: params.term,
    limit: params.limit,
    source,
  };
  Ok(Json(service.search(&caller, request).await?))
}
