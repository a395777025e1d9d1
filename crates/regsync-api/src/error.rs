//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Quota and feature errors carry the tier and ceiling so a client can offer
//! an upgrade. Upstream, timeout and store failures are reported with a
//! generic retryable message; their detail goes to the log only.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use regsync_sync::{Error, ErrorKind};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Sync(#[from] Error),

  /// Malformed request parameters or caller headers.
  #[error("bad request: {0}")]
  BadRequest(String),
}

const RETRY_MESSAGE: &str = "the company registry is temporarily unavailable, please retry";

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let e = match self {
      ApiError::BadRequest(m) => {
        return (
          StatusCode::BAD_REQUEST,
          Json(json!({ "error": m, "kind": ErrorKind::Validation })),
        )
          .into_response();
      }
      ApiError::Sync(e) => e,
    };

    let kind = e.kind();
    let (status, body) = match &e {
      Error::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": e.to_string(), "kind": kind })),
      Error::Validation(m) => (StatusCode::BAD_REQUEST, json!({ "error": m, "kind": kind })),
      Error::QuotaExceeded { tier, scope, used, ceiling } => (
        StatusCode::TOO_MANY_REQUESTS,
        json!({
          "error": e.to_string(),
          "kind": kind,
          "tier": tier,
          "scope": scope,
          "used": used,
          "ceiling": ceiling,
          "upgrade": true,
        }),
      ),
      Error::FeatureNotAvailable { tier, feature } => (
        StatusCode::FORBIDDEN,
        json!({
          "error": e.to_string(),
          "kind": kind,
          "tier": tier,
          "feature": feature,
          "upgrade": true,
        }),
      ),
      Error::Upstream { .. } => (
        StatusCode::BAD_GATEWAY,
        json!({ "error": RETRY_MESSAGE, "kind": kind, "retryable": true }),
      ),
      Error::Timeout(_) => (
        StatusCode::GATEWAY_TIMEOUT,
        json!({ "error": RETRY_MESSAGE, "kind": kind, "retryable": true }),
      ),
      Error::Store(_) => (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "internal error, please retry", "kind": kind, "retryable": true }),
      ),
    };

    if status.is_server_error() {
      tracing::error!(error = %e, "request failed");
    }
    (status, Json(body)).into_response()
  }
}
