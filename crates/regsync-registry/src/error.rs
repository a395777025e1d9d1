//! Error type for `regsync-registry`.
//!
//! A 404 from the registry is not an error: it surfaces as `None` or an empty
//! list. Nothing here is retried automatically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Non-2xx response or transport failure.
  #[error("registry request failed (status {status:?}): {message}")]
  Upstream {
    status:  Option<u16>,
    message: String,
  },

  #[error("malformed registry response: {0}")]
  Decode(String),

  #[error("core error: {0}")]
  Core(#[from] regsync_core::Error),

  #[error("failed to build HTTP client: {0}")]
  Build(#[source] reqwest::Error),
}

impl Error {
  /// Upstream HTTP status, when one was received.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Upstream { status, .. } => *status,
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
