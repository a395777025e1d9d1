//! JSON REST API for the registry sync engine.
//!
//! Exposes an axum [`Router`] over a [`SyncService`]. Callers are identified
//! by headers set upstream (see [`caller`]); TLS and tracing layers are the
//! binary's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = regsync_api::api_router(service).layer(TraceLayer::new_for_http());
//! ```

pub mod batch;
pub mod caller;
pub mod companies;
pub mod error;
pub mod search;
pub mod status;

use axum::{
  Router,
  routing::{get, post},
};
use regsync_core::{risk::RiskAnalyzer, store::CacheStore};
use regsync_registry::Registry;
use regsync_sync::SyncService;

pub use caller::CallerContext;
pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
pub fn api_router<S, R, A>(service: SyncService<S, R, A>) -> Router<()>
where
  S: CacheStore + 'static,
  R: Registry + 'static,
  A: RiskAnalyzer + 'static,
{
  Router::new()
    .route("/search", get(search::handler::<S, R, A>))
    .route("/companies/{id}", get(companies::get_one::<S, R, A>))
    .route("/batch", post(batch::handler::<S, R, A>))
    .route("/quota", get(status::quota::<S, R, A>))
    .route("/health", get(status::health::<S, R, A>))
    .with_state(service)
}
