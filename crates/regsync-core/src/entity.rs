//! Entity — a company as known to the registry and mirrored in the cache.
//!
//! The natural key is the registry-assigned identifier, always held in its
//! normalised form (see [`normalize_entity_id`]).

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identifier ──────────────────────────────────────────────────────────────

/// Longest identifier the registry issues once normalised.
pub const MAX_ID_LEN: usize = 10;

/// Canonical width of a registry identifier.
const CANONICAL_ID_LEN: usize = 8;

/// Normalise a caller-supplied identifier before it is used as a key or sent
/// upstream.
///
/// Uppercases, strips every non-alphanumeric character, then left-pads short
/// identifiers with zeros: purely numeric ones to eight digits, two-letter
/// prefixed ones (`SC`, `NI`, `OC`, ...) after the prefix.
pub fn normalize_entity_id(raw: &str) -> Result<String> {
  let id: String = raw
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_uppercase())
    .collect();

  if id.is_empty() || id.len() > MAX_ID_LEN || !raw.is_ascii() {
    return Err(Error::InvalidIdentifier(raw.to_owned()));
  }

  if id.len() < CANONICAL_ID_LEN {
    if id.chars().all(|c| c.is_ascii_digit()) {
      return Ok(format!("{id:0>width$}", width = CANONICAL_ID_LEN));
    }
    let (prefix, digits) = id.split_at(2.min(id.len()));
    if prefix.chars().all(|c| c.is_ascii_alphabetic())
      && !digits.is_empty()
      && digits.chars().all(|c| c.is_ascii_digit())
    {
      let width = CANONICAL_ID_LEN - prefix.len();
      return Ok(format!("{prefix}{digits:0>width$}"));
    }
  }

  Ok(id)
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityStatus {
  Active,
  Dissolved,
  InLiquidation,
  Dormant,
  Suspended,
  StruckOff,
  #[default]
  Unknown,
}

impl EntityStatus {
  /// Lenient parse of a registry status string. Anything unrecognised maps to
  /// [`EntityStatus::Unknown`].
  pub fn parse(s: &str) -> Self {
    let folded: String = s
      .trim()
      .to_ascii_lowercase()
      .chars()
      .map(|c| if c == '_' || c == ' ' { '-' } else { c })
      .collect();

    match folded.as_str() {
      "active" | "open" | "registered" => Self::Active,
      "dissolved" | "closed" | "converted-closed" => Self::Dissolved,
      "liquidation" | "in-liquidation" | "receivership" | "administration" => {
        Self::InLiquidation
      }
      "dormant" => Self::Dormant,
      "suspended" | "voluntary-arrangement" => Self::Suspended,
      "struck-off" | "removed" => Self::StruckOff,
      _ => Self::Unknown,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Dissolved => "dissolved",
      Self::InLiquidation => "in-liquidation",
      Self::Dormant => "dormant",
      Self::Suspended => "suspended",
      Self::StruckOff => "struck-off",
      Self::Unknown => "unknown",
    }
  }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// A company record. Upserts overwrite every attribute; there is no field
/// level merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
  pub entity_id:             String,
  pub name:                  String,
  pub status:                EntityStatus,
  pub legal_form:            Option<String>,
  pub incorporated_on:       Option<NaiveDate>,
  pub dissolved_on:          Option<NaiveDate>,
  pub jurisdiction:          Option<String>,
  pub registered_address:    Option<String>,
  pub classification_codes:  BTreeSet<String>,
  /// When the full record was last fetched from the registry. `None` for
  /// rows seeded from search hits, which are therefore always stale.
  pub last_synced_at:        Option<DateTime<Utc>>,
  /// When the officer list was last written from the registry.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub officers_synced_at:    Option<DateTime<Utc>>,
  /// When the controller list was last written from the registry.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub controllers_synced_at: Option<DateTime<Utc>>,
}

impl Entity {
  /// A minimal record carrying only identity; everything else defaults.
  pub fn new(entity_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      entity_id:             entity_id.into(),
      name:                  name.into(),
      status:                EntityStatus::Unknown,
      legal_form:            None,
      incorporated_on:       None,
      dissolved_on:          None,
      jurisdiction:          None,
      registered_address:    None,
      classification_codes:  BTreeSet::new(),
      last_synced_at:        None,
      officers_synced_at:    None,
      controllers_synced_at: None,
    }
  }

  /// Whether the record was synchronised within `window` of `now`.
  pub fn is_fresh(&self, window: Duration, now: DateTime<Utc>) -> bool {
    self
      .last_synced_at
      .is_some_and(|at| now.signed_duration_since(at) < window)
  }

  /// Whether the record and every requested appointment list were
  /// synchronised within `window` of `now`. A list that was never fetched
  /// is not fresh, even when the record itself is.
  pub fn covers(
    &self,
    officers: bool,
    controllers: bool,
    window: Duration,
    now: DateTime<Utc>,
  ) -> bool {
    let within = |at: Option<DateTime<Utc>>| {
      at.is_some_and(|at| now.signed_duration_since(at) < window)
    };
    within(self.last_synced_at)
      && (!officers || within(self.officers_synced_at))
      && (!controllers || within(self.controllers_synced_at))
  }
}
