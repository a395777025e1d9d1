//! Server configuration and wiring for the registry sync service.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::Router;
use regsync_registry::{
  RateLimiter, RegistryClient, RegistryConfig,
  limiter::{REGISTRY_MAX_REQUESTS, REGISTRY_WINDOW},
  risk::HttpRiskAnalyzer,
};
use regsync_store_sqlite::SqliteStore;
use regsync_sync::{SyncConfig, SyncService, synchronizer::DEFAULT_FRESHNESS_HOURS};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

pub const ENV_PREFIX: &str = "REGSYNC";

/// Runtime server configuration, deserialised from `config.toml` and
/// `REGSYNC_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  pub store_path:             PathBuf,
  #[serde(default = "default_registry_base_url")]
  pub registry_base_url:      String,
  pub registry_api_key:       String,
  #[serde(default = "default_registry_timeout_secs")]
  pub registry_timeout_secs:  u64,
  #[serde(default = "default_rate_limit_requests")]
  pub rate_limit_requests:    usize,
  #[serde(default = "default_rate_limit_window_secs")]
  pub rate_limit_window_secs: u64,
  #[serde(default = "default_freshness_hours")]
  pub freshness_hours:        i64,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs:   u64,
  #[serde(default = "default_batch_concurrency")]
  pub batch_concurrency:      usize,
  /// Risk-analysis endpoint; risk summaries are omitted when unset.
  #[serde(default)]
  pub risk_url:               Option<String>,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_registry_base_url() -> String {
  "https://api.company-information.service.gov.uk".to_string()
}
fn default_registry_timeout_secs() -> u64 { 20 }
fn default_rate_limit_requests() -> usize { REGISTRY_MAX_REQUESTS }
fn default_rate_limit_window_secs() -> u64 { REGISTRY_WINDOW.as_secs() }
fn default_freshness_hours() -> i64 { DEFAULT_FRESHNESS_HOURS }
fn default_request_timeout_secs() -> u64 { 60 }
fn default_batch_concurrency() -> usize { 4 }

impl ServerConfig {
  /// Layer the optional TOML file at `path` under the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn sync_config(&self) -> SyncConfig {
    SyncConfig {
      freshness:         chrono::Duration::hours(self.freshness_hours),
      request_timeout:   Duration::from_secs(self.request_timeout_secs),
      batch_concurrency: self.batch_concurrency.max(1),
    }
  }

  pub fn registry_config(&self) -> RegistryConfig {
    RegistryConfig {
      base_url: self.registry_base_url.clone(),
      api_key:  self.registry_api_key.clone(),
      timeout:  Duration::from_secs(self.registry_timeout_secs),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Wiring ───────────────────────────────────────────────────────────────────

/// Open the store, build the registry client and return the HTTP app.
pub async fn build_app(cfg: &ServerConfig) -> anyhow::Result<Router> {
  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let limiter = Arc::new(RateLimiter::new(
    cfg.rate_limit_requests,
    Duration::from_secs(cfg.rate_limit_window_secs),
  ));
  let registry = RegistryClient::new(cfg.registry_config(), limiter)
    .context("failed to build registry client")?;

  let risk = cfg
    .risk_url
    .as_deref()
    .map(|url| HttpRiskAnalyzer::new(url, Duration::from_secs(cfg.registry_timeout_secs)))
    .transpose()
    .context("failed to build risk analyzer client")?;
  if risk.is_none() {
    tracing::info!("no risk_url configured; risk summaries disabled");
  }

  let service = SyncService::new(Arc::new(store), Arc::new(registry), risk, cfg.sync_config());
  Ok(regsync_api::api_router(service).layer(TraceLayer::new_for_http()))
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn defaults_fill_unset_fields() {
    let cfg = parse(
      r#"
        store_path = ":memory:"
        registry_api_key = "key"
      "#,
    );
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert_eq!(cfg.rate_limit_requests, 600);
    assert_eq!(cfg.rate_limit_window_secs, 300);
    assert_eq!(cfg.registry_timeout_secs, 20);
    assert_eq!(cfg.sync_config().freshness, chrono::Duration::hours(24));
    assert!(cfg.risk_url.is_none());
  }

  #[test]
  fn explicit_values_win() {
    let cfg = parse(
      r#"
        port = 9000
        store_path = "~/regsync.db"
        registry_api_key = "key"
        batch_concurrency = 0
        risk_url = "http://localhost:9100/assess"
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.sync_config().batch_concurrency, 1);
    assert_eq!(cfg.risk_url.as_deref(), Some("http://localhost:9100/assess"));
  }

  #[test]
  fn tilde_expands_to_home() {
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    }
    assert_eq!(expand_tilde(Path::new("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
  }

  #[tokio::test]
  async fn app_builds_with_in_memory_store() {
    let cfg = parse(
      r#"
        store_path = ":memory:"
        registry_api_key = "key"
      "#,
    );
    assert!(build_app(&cfg).await.is_ok());
  }
}
