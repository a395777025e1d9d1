//! HTTP implementation of [`Registry`] against a Companies House-style API.

use std::{sync::Arc, time::Duration};

use regsync_core::{candidate::Candidate, entity::normalize_entity_id};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::{
  Error, Registry, Result,
  limiter::RateLimiter,
  model::{RemoteCompany, RemoteOfficer},
  wire::{CompanyProfile, OfficerList, PscList, SearchResponse},
};

/// Longest slice of an error body carried into an [`Error::Upstream`].
const ERROR_BODY_SNIPPET: usize = 200;

/// Connection settings for the registry API.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
  pub base_url: String,
  /// Sent as the basic-auth username with an empty password.
  pub api_key:  String,
  pub timeout:  Duration,
}

/// Rate-limited client for the registry API.
///
/// Cheap to clone; clones share the HTTP connection pool and the limiter.
#[derive(Debug, Clone)]
pub struct RegistryClient {
  http:    Client,
  config:  RegistryConfig,
  limiter: Arc<RateLimiter>,
}

impl RegistryClient {
  pub fn new(config: RegistryConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(Error::Build)?;
    Ok(Self { http, config, limiter })
  }

  pub fn limiter(&self) -> &Arc<RateLimiter> { &self.limiter }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// GET a JSON document. A 404 is `Ok(None)`.
  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<Option<T>> {
    self.limiter.acquire().await;

    let resp = self
      .http
      .get(self.url(path))
      .basic_auth(&self.config.api_key, None::<&str>)
      .header(reqwest::header::ACCEPT, "application/json")
      .query(query)
      .send()
      .await
      .map_err(|e| transport_error(path, e))?;

    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
      tracing::debug!(path, "registry returned 404");
      return Ok(None);
    }
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      tracing::warn!(path, status = status.as_u16(), "registry request failed");
      return Err(Error::Upstream {
        status:  Some(status.as_u16()),
        message: body.chars().take(ERROR_BODY_SNIPPET).collect(),
      });
    }

    resp
      .json()
      .await
      .map(Some)
      .map_err(|e| Error::Decode(format!("{path}: {e}")))
  }
}

fn transport_error(path: &str, e: reqwest::Error) -> Error {
  let message = if e.is_timeout() {
    format!("{path}: timed out")
  } else {
    format!("{path}: {e}")
  };
  tracing::warn!(%message, "registry transport error");
  Error::Upstream { status: e.status().map(|s| s.as_u16()), message }
}

impl Registry for RegistryClient {
  async fn search(&self, term: &str, limit: usize) -> Result<Vec<Candidate>> {
    let found: Option<SearchResponse> = self
      .get_json(
        "/search/companies",
        &[("q", term.to_owned()), ("items_per_page", limit.to_string())],
      )
      .await?;

    Ok(
      found
        .map(|r| r.items)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| item.into_candidate(term))
        .take(limit)
        .collect(),
    )
  }

  async fn get_entity(&self, entity_id: &str) -> Result<Option<RemoteCompany>> {
    let id = normalize_entity_id(entity_id)?;
    let profile: Option<CompanyProfile> = self.get_json(&format!("/company/{id}"), &[]).await?;
    Ok(profile.map(|p| p.into_remote(&id)))
  }

  async fn get_officers(&self, entity_id: &str) -> Result<Vec<RemoteOfficer>> {
    let id = normalize_entity_id(entity_id)?;
    let list: Option<OfficerList> = self
      .get_json(&format!("/company/{id}/officers"), &[])
      .await?;
    Ok(
      list
        .map(|l| l.items)
        .unwrap_or_default()
        .into_iter()
        .map(RemoteOfficer::from)
        .collect(),
    )
  }

  async fn get_controllers(&self, entity_id: &str) -> Result<Vec<RemoteOfficer>> {
    let id = normalize_entity_id(entity_id)?;
    let list: Option<PscList> = self
      .get_json(&format!("/company/{id}/persons-with-significant-control"), &[])
      .await?;
    Ok(
      list
        .map(|l| l.items)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| item.into_remote())
        .collect(),
    )
  }

  async fn remaining_budget(&self) -> Option<usize> { Some(self.limiter.remaining().await) }
}
