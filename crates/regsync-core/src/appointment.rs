//! Appointments link a person to an entity in some role.
//!
//! The composite key is `(entity, person, role, started_on)`. Historical
//! appointments are never overwritten: an insert that collides on the key is
//! a no-op.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::person::Person;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
  Director,
  Secretary,
  SignificantControl,
  Shareholder,
  Trustee,
  Other,
}

impl Role {
  /// Map a registry officer-role string onto a [`Role`].
  pub fn parse(s: &str) -> Self {
    let s = s.trim().to_ascii_lowercase();
    if s.contains("secretary") {
      Self::Secretary
    } else if s.contains("director") {
      Self::Director
    } else if s.contains("significant") || s.contains("psc") {
      Self::SignificantControl
    } else if s.contains("shareholder") {
      Self::Shareholder
    } else if s.contains("trustee") {
      Self::Trustee
    } else {
      Self::Other
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Director => "director",
      Self::Secretary => "secretary",
      Self::SignificantControl => "significant-control",
      Self::Shareholder => "shareholder",
      Self::Trustee => "trustee",
      Self::Other => "other",
    }
  }

  pub fn from_str_exact(s: &str) -> Option<Self> {
    match s {
      "director" => Some(Self::Director),
      "secretary" => Some(Self::Secretary),
      "significant-control" => Some(Self::SignificantControl),
      "shareholder" => Some(Self::Shareholder),
      "trustee" => Some(Self::Trustee),
      "other" => Some(Self::Other),
      _ => None,
    }
  }

  /// Controllers are served separately from officers.
  pub fn is_control(self) -> bool { matches!(self, Self::SignificantControl) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
  pub entity_id:  String,
  pub person_key: String,
  pub role:       Role,
  pub started_on: Option<NaiveDate>,
  /// `None` while the appointment is still in force.
  pub ended_on:   Option<NaiveDate>,
}

impl Appointment {
  pub fn is_active(&self) -> bool { self.ended_on.is_none() }
}

/// An appointment bundled with the person it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAppointment {
  pub appointment: Appointment,
  pub person:      Person,
}
