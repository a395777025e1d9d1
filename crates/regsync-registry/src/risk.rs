//! Risk analysis delegated to an external scoring service over HTTP.

use std::time::Duration;

use regsync_core::risk::{EntitySnapshot, RiskAnalyzer, RiskSummary, RiskUnavailable};
use reqwest::Client;

use crate::{Error, Result};

/// POSTs an [`EntitySnapshot`] as JSON to `url` and expects a
/// [`RiskSummary`] back.
#[derive(Debug, Clone)]
pub struct HttpRiskAnalyzer {
  http: Client,
  url:  String,
}

impl HttpRiskAnalyzer {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
    let http = Client::builder().timeout(timeout).build().map_err(Error::Build)?;
    Ok(Self { http, url: url.into() })
  }
}

impl RiskAnalyzer for HttpRiskAnalyzer {
  async fn assess(&self, snapshot: &EntitySnapshot) -> Result<RiskSummary, RiskUnavailable> {
    let resp = self
      .http
      .post(&self.url)
      .json(snapshot)
      .send()
      .await
      .map_err(|e| RiskUnavailable(e.to_string()))?;

    if !resp.status().is_success() {
      return Err(RiskUnavailable(format!("analyzer returned {}", resp.status())));
    }

    let summary: RiskSummary = resp
      .json()
      .await
      .map_err(|e| RiskUnavailable(format!("malformed analyzer response: {e}")))?;
    tracing::debug!(
      entity_id = %snapshot.entity.entity_id,
      score = summary.score,
      "risk assessed"
    );
    Ok(summary)
  }
}
