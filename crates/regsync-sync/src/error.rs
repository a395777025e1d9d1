//! Error type for `regsync-sync`.
//!
//! These are the errors a caller sees. Each carries an [`ErrorKind`] so the
//! HTTP layer and batch outcomes can classify it without matching on text.

use std::time::Duration;

use regsync_core::tier::Tier;
use serde::Serialize;
use thiserror::Error;

/// Which ceiling a [`Error::QuotaExceeded`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
  DailyRequests,
  BatchSize,
}

#[derive(Debug, Error)]
pub enum Error {
  /// Absent both locally and upstream.
  #[error("entity not found: {0}")]
  NotFound(String),

  #[error("registry unavailable (status {status:?}): {message}")]
  Upstream {
    status:  Option<u16>,
    message: String,
  },

  #[error("quota exceeded for {tier} tier: {used} of {ceiling} ({scope:?})")]
  QuotaExceeded {
    tier:    Tier,
    scope:   QuotaScope,
    used:    u32,
    ceiling: u32,
  },

  #[error("{feature} is not available on the {tier} tier")]
  FeatureNotAvailable { tier: Tier, feature: &'static str },

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("cache store error: {0}")]
  Store(String),

  #[error("operation timed out after {0:?}")]
  Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  Upstream,
  QuotaExceeded,
  FeatureNotAvailable,
  Validation,
  Store,
  Timeout,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::Upstream { .. } => ErrorKind::Upstream,
      Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
      Self::FeatureNotAvailable { .. } => ErrorKind::FeatureNotAvailable,
      Self::Validation(_) => ErrorKind::Validation,
      Self::Store(_) => ErrorKind::Store,
      Self::Timeout(_) => ErrorKind::Timeout,
    }
  }

  /// Wrap a backend error; the store's own type is erased here.
  pub fn store(e: impl std::error::Error) -> Self { Self::Store(e.to_string()) }
}

impl From<regsync_core::Error> for Error {
  fn from(e: regsync_core::Error) -> Self { Self::Validation(e.to_string()) }
}

impl From<regsync_registry::Error> for Error {
  fn from(e: regsync_registry::Error) -> Self {
    use regsync_registry::Error as R;
    match e {
      R::Core(e) => e.into(),
      R::Upstream { status, message } => Self::Upstream { status, message },
      other => Self::Upstream {
        status:  None,
        message: other.to_string(),
      },
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
