//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexicographic order matches chronological order. Calendar dates are
//! `YYYY-MM-DD`, birth months `YYYY-MM`, classification codes a JSON array.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regsync_core::{
  appointment::{Appointment, ResolvedAppointment, Role},
  entity::{Entity, EntityStatus},
  person::{BirthMonth, Person},
  relationship::Relationship,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

/// Appointment start dates take part in the primary key, so an unknown date is
/// the empty string rather than NULL.
pub fn encode_start_date(d: Option<NaiveDate>) -> String {
  d.map(encode_date).unwrap_or_default()
}

pub fn decode_start_date(s: &str) -> Result<Option<NaiveDate>> {
  if s.is_empty() { Ok(None) } else { decode_date(s).map(Some) }
}

// ─── BirthMonth ──────────────────────────────────────────────────────────────

pub fn encode_birth(b: BirthMonth) -> String { format!("{:04}-{:02}", b.year, b.month) }

pub fn decode_birth(s: &str) -> Result<BirthMonth> {
  let (year, month) = s
    .split_once('-')
    .ok_or_else(|| Error::DateParse(format!("bad birth month: {s:?}")))?;
  let year: i32 = year
    .parse()
    .map_err(|_| Error::DateParse(format!("bad birth year: {s:?}")))?;
  let month: u32 = month
    .parse()
    .map_err(|_| Error::DateParse(format!("bad birth month: {s:?}")))?;
  BirthMonth::new(year, month).ok_or_else(|| Error::DateParse(format!("bad birth month: {s:?}")))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn encode_status(s: EntityStatus) -> &'static str { s.as_str() }

/// Stored statuses were written by us, but stay lenient: anything unexpected
/// reads back as `unknown`.
pub fn decode_status(s: &str) -> EntityStatus { EntityStatus::parse(s) }

pub fn encode_role(r: Role) -> &'static str { r.as_str() }

pub fn decode_role(s: &str) -> Result<Role> {
  Role::from_str_exact(s).ok_or_else(|| Error::Decode(format!("unknown role: {s:?}")))
}

// ─── Classification codes ────────────────────────────────────────────────────

pub fn encode_codes(codes: &BTreeSet<String>) -> Result<String> {
  Ok(serde_json::to_string(codes)?)
}

pub fn decode_codes(s: &str) -> Result<BTreeSet<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const ENTITY_COLUMNS: &str = "entity_id, name, status, legal_form, incorporated_on, \
   dissolved_on, jurisdiction, registered_address, classification_codes, last_synced_at, \
   officers_synced_at, controllers_synced_at";

/// Raw strings read directly from an `entities` row.
pub struct RawEntity {
  pub entity_id:             String,
  pub name:                  String,
  pub status:                String,
  pub legal_form:            Option<String>,
  pub incorporated_on:       Option<String>,
  pub dissolved_on:          Option<String>,
  pub jurisdiction:          Option<String>,
  pub registered_address:    Option<String>,
  pub classification_codes:  String,
  pub last_synced_at:        Option<String>,
  pub officers_synced_at:    Option<String>,
  pub controllers_synced_at: Option<String>,
}

impl RawEntity {
  /// Read a row selected with [`ENTITY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:             row.get(0)?,
      name:                  row.get(1)?,
      status:                row.get(2)?,
      legal_form:            row.get(3)?,
      incorporated_on:       row.get(4)?,
      dissolved_on:          row.get(5)?,
      jurisdiction:          row.get(6)?,
      registered_address:    row.get(7)?,
      classification_codes:  row.get(8)?,
      last_synced_at:        row.get(9)?,
      officers_synced_at:    row.get(10)?,
      controllers_synced_at: row.get(11)?,
    })
  }

  pub fn encode(entity: &Entity) -> Result<Self> {
    Ok(Self {
      entity_id:             entity.entity_id.clone(),
      name:                  entity.name.clone(),
      status:                encode_status(entity.status).to_owned(),
      legal_form:            entity.legal_form.clone(),
      incorporated_on:       entity.incorporated_on.map(encode_date),
      dissolved_on:          entity.dissolved_on.map(encode_date),
      jurisdiction:          entity.jurisdiction.clone(),
      registered_address:    entity.registered_address.clone(),
      classification_codes:  encode_codes(&entity.classification_codes)?,
      last_synced_at:        entity.last_synced_at.map(encode_dt),
      officers_synced_at:    entity.officers_synced_at.map(encode_dt),
      controllers_synced_at: entity.controllers_synced_at.map(encode_dt),
    })
  }

  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      entity_id:             self.entity_id,
      name:                  self.name,
      status:                decode_status(&self.status),
      legal_form:            self.legal_form,
      incorporated_on:       self.incorporated_on.as_deref().map(decode_date).transpose()?,
      dissolved_on:          self.dissolved_on.as_deref().map(decode_date).transpose()?,
      jurisdiction:          self.jurisdiction,
      registered_address:    self.registered_address,
      classification_codes:  decode_codes(&self.classification_codes)?,
      last_synced_at:        self.last_synced_at.as_deref().map(decode_dt).transpose()?,
      officers_synced_at:    self.officers_synced_at.as_deref().map(decode_dt).transpose()?,
      controllers_synced_at: self.controllers_synced_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw strings read from `appointments` joined with `persons`.
pub struct RawResolvedAppointment {
  // appointments columns
  pub entity_id:   String,
  pub person_key:  String,
  pub role:        String,
  pub started_on:  String,
  pub ended_on:    Option<String>,
  // persons join
  pub full_name:   String,
  pub born:        Option<String>,
  pub nationality: Option<String>,
  pub address:     Option<String>,
}

impl RawResolvedAppointment {
  pub fn into_resolved(self) -> Result<ResolvedAppointment> {
    let appointment = Appointment {
      entity_id:  self.entity_id,
      person_key: self.person_key.clone(),
      role:       decode_role(&self.role)?,
      started_on: decode_start_date(&self.started_on)?,
      ended_on:   self.ended_on.as_deref().map(decode_date).transpose()?,
    };

    let person = Person {
      person_key:  self.person_key,
      full_name:   self.full_name,
      born:        self.born.as_deref().map(decode_birth).transpose()?,
      nationality: self.nationality,
      address:     self.address,
    };

    Ok(ResolvedAppointment { appointment, person })
  }
}

/// Raw values read from a `relationships` row.
pub struct RawRelationship {
  pub from_entity:       String,
  pub to_entity:         String,
  pub relationship_type: String,
  pub ownership_pct:     Option<f64>,
  pub confidence:        f64,
}

impl RawRelationship {
  pub fn into_relationship(self) -> Result<Relationship> {
    let base = Relationship::new(self.from_entity, self.to_entity, self.relationship_type)
      .with_confidence(self.confidence);
    Ok(match self.ownership_pct {
      Some(pct) => base.with_ownership(pct)?,
      None => base,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_sort_lexicographically() {
    let earlier = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap().with_timezone(&Utc);
    let later = DateTime::parse_from_rfc3339("2024-05-01T10:00:00.5Z").unwrap().with_timezone(&Utc);
    assert!(encode_dt(earlier) < encode_dt(later));
    assert_eq!(decode_dt(&encode_dt(later)).unwrap(), later);
  }

  #[test]
  fn birth_month_column() {
    let b = BirthMonth::new(1975, 3).unwrap();
    assert_eq!(encode_birth(b), "1975-03");
    assert_eq!(decode_birth("1975-03").unwrap(), b);
    assert!(decode_birth("1975").is_err());
  }

  #[test]
  fn empty_start_date_is_unknown() {
    assert_eq!(decode_start_date("").unwrap(), None);
    assert_eq!(encode_start_date(None), "");
  }
}
