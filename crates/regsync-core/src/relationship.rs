//! Entity-to-entity links, e.g. a parent company controlling a subsidiary.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const CONTROLS: &str = "controls";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
  pub from_entity:       String,
  pub to_entity:         String,
  pub relationship_type: String,
  /// Ownership share in percent, `0.0..=100.0`.
  pub ownership_pct:     Option<f64>,
  /// `0.0..=1.0`; registry-sourced links are certain.
  pub confidence:        f64,
}

impl Relationship {
  pub fn new(
    from_entity: impl Into<String>,
    to_entity: impl Into<String>,
    relationship_type: impl Into<String>,
  ) -> Self {
    Self {
      from_entity:       from_entity.into(),
      to_entity:         to_entity.into(),
      relationship_type: relationship_type.into(),
      ownership_pct:     None,
      confidence:        1.0,
    }
  }

  pub fn with_ownership(mut self, pct: f64) -> Result<Self> {
    if !(0.0..=100.0).contains(&pct) {
      return Err(Error::InvalidPercentage(pct));
    }
    self.ownership_pct = Some(pct);
    Ok(self)
  }

  pub fn with_confidence(mut self, confidence: f64) -> Self {
    self.confidence = confidence.clamp(0.0, 1.0);
    self
  }
}
