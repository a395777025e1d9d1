//! Caller identity extractor.
//!
//! The auth/billing layer in front of this service resolves the caller and
//! their tier and forwards them as headers.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use regsync_core::tier::Tier;
use regsync_sync::Caller;

use crate::error::ApiError;

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_TIER_HEADER: &str = "x-caller-tier";

/// Present in a handler means the request carried a valid caller.
#[derive(Debug, Clone)]
pub struct CallerContext(pub Caller);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
  headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .ok_or_else(|| ApiError::BadRequest(format!("missing or unreadable {name} header")))
}

/// Resolve the caller from request headers.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
  let id = header(headers, CALLER_ID_HEADER)?;
  let tier: Tier = header(headers, CALLER_TIER_HEADER)?
    .parse()
    .map_err(|e: regsync_core::Error| ApiError::BadRequest(e.to_string()))?;
  Ok(Caller::new(id, tier)?)
}

impl<St> FromRequestParts<St> for CallerContext
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    caller_from_headers(&parts.headers).map(CallerContext)
  }
}
