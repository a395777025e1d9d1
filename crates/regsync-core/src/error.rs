//! Error types for `regsync-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid entity identifier: {0:?}")]
  InvalidIdentifier(String),

  #[error("invalid search term: {0}")]
  InvalidTerm(String),

  #[error("unknown subscription tier: {0:?}")]
  UnknownTier(String),

  #[error("unknown source preference: {0:?}")]
  UnknownSource(String),

  #[error("ownership percentage out of range: {0}")]
  InvalidPercentage(f64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
