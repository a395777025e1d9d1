//! Subscription tiers and the limits each one grants.
//!
//! Tiers are resolved by an external billing collaborator; this crate only
//! maps a tier to its limits.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
  Free,
  Starter,
  Professional,
  Enterprise,
}

/// Limits granted by a [`Tier`]. `None` means unlimited or, for batches,
/// not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLimits {
  pub daily_requests: Option<u32>,
  pub max_results:    usize,
  pub max_batch:      Option<usize>,
}

const FREE: TierLimits = TierLimits {
  daily_requests: Some(5),
  max_results:    5,
  max_batch:      None,
};

const STARTER: TierLimits = TierLimits {
  daily_requests: Some(100),
  max_results:    20,
  max_batch:      None,
};

const PROFESSIONAL: TierLimits = TierLimits {
  daily_requests: Some(1000),
  max_results:    50,
  max_batch:      Some(25),
};

const ENTERPRISE: TierLimits = TierLimits {
  daily_requests: None,
  max_results:    100,
  max_batch:      Some(100),
};

impl Tier {
  pub const fn limits(self) -> TierLimits {
    match self {
      Self::Free => FREE,
      Self::Starter => STARTER,
      Self::Professional => PROFESSIONAL,
      Self::Enterprise => ENTERPRISE,
    }
  }

  /// `min(requested, tier ceiling)`, never below one.
  pub fn cap_results(self, requested: usize) -> usize {
    requested.clamp(1, self.limits().max_results)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Free => "free",
      Self::Starter => "starter",
      Self::Professional => "professional",
      Self::Enterprise => "enterprise",
    }
  }
}

impl std::fmt::Display for Tier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Tier {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "free" => Ok(Self::Free),
      "starter" | "basic" => Ok(Self::Starter),
      "professional" | "pro" => Ok(Self::Professional),
      "enterprise" => Ok(Self::Enterprise),
      other => Err(Error::UnknownTier(other.to_owned())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn result_cap_is_min_of_request_and_ceiling() {
    assert_eq!(Tier::Free.cap_results(50), 5);
    assert_eq!(Tier::Starter.cap_results(10), 10);
    assert_eq!(Tier::Enterprise.cap_results(1000), 100);
  }

  #[test]
  fn batch_only_for_upper_tiers() {
    assert_eq!(Tier::Free.limits().max_batch, None);
    assert_eq!(Tier::Starter.limits().max_batch, None);
    assert_eq!(Tier::Professional.limits().max_batch, Some(25));
    assert_eq!(Tier::Enterprise.limits().max_batch, Some(100));
  }

  #[test]
  fn parses_aliases() {
    assert_eq!("Pro".parse::<Tier>().unwrap(), Tier::Professional);
    assert!("platinum".parse::<Tier>().is_err());
  }
}
