//! The risk-analysis collaborator seam.
//!
//! Scoring is done elsewhere. The engine hands over a resolved snapshot and
//! passes whatever comes back through untouched.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{appointment::ResolvedAppointment, entity::Entity, relationship::Relationship};

/// Everything known locally about an entity at the time of analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
  pub entity:        Entity,
  pub appointments:  Vec<ResolvedAppointment>,
  pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
  /// 1 (low) to 10 (high), as reported by the collaborator.
  pub score:    u8,
  pub category: String,
  #[serde(default)]
  pub factors:  Vec<String>,
}

#[derive(Debug, Error)]
#[error("risk analysis unavailable: {0}")]
pub struct RiskUnavailable(pub String);

pub trait RiskAnalyzer: Send + Sync {
  fn assess<'a>(
    &'a self,
    snapshot: &'a EntitySnapshot,
  ) -> impl Future<Output = Result<RiskSummary, RiskUnavailable>> + Send + 'a;
}

/// Analyzer used when no collaborator is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRiskAnalysis;

impl RiskAnalyzer for NoRiskAnalysis {
  async fn assess(&self, _: &EntitySnapshot) -> Result<RiskSummary, RiskUnavailable> {
    Err(RiskUnavailable("no analyzer configured".into()))
  }
}

impl<A: RiskAnalyzer> RiskAnalyzer for Option<A> {
  async fn assess(&self, snapshot: &EntitySnapshot) -> Result<RiskSummary, RiskUnavailable> {
    match self {
      Some(analyzer) => analyzer.assess(snapshot).await,
      None => NoRiskAnalysis.assess(snapshot).await,
    }
  }
}
