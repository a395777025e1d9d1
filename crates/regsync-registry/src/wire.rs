//! JSON shapes returned by the registry API.
//!
//! Only the fields the engine consumes are declared; everything else in the
//! upstream payload is ignored. Optional upstream fields are `Option` or
//! `#[serde(default)]` so that sparse records still decode.

use chrono::NaiveDate;
use regsync_core::{
  appointment::Role,
  candidate::{Candidate, CandidateSource, match_score},
  entity::{EntityStatus, normalize_entity_id},
  person::BirthMonth,
};
use serde::Deserialize;

use crate::model::{RemoteCompany, RemoteOfficer};

// ─── Shared ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct Address {
  pub premises:       Option<String>,
  pub address_line_1: Option<String>,
  pub address_line_2: Option<String>,
  pub locality:       Option<String>,
  pub region:         Option<String>,
  pub postal_code:    Option<String>,
  pub country:        Option<String>,
}

impl Address {
  /// Single-line rendering, skipping blank parts.
  pub fn snippet(&self) -> Option<String> {
    let parts: Vec<&str> = [
      &self.premises,
      &self.address_line_1,
      &self.address_line_2,
      &self.locality,
      &self.region,
      &self.postal_code,
      &self.country,
    ]
    .into_iter()
    .filter_map(|p| p.as_deref().map(str::trim))
    .filter(|p| !p.is_empty())
    .collect();

    (!parts.is_empty()).then(|| parts.join(", "))
  }
}

#[derive(Debug, Deserialize)]
pub struct DateOfBirth {
  pub month: u32,
  pub year:  i32,
}

impl DateOfBirth {
  fn to_birth_month(&self) -> Option<BirthMonth> { BirthMonth::new(self.year, self.month) }
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
  #[serde(default)]
  pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
  pub company_number:   String,
  pub title:            String,
  pub company_status:   Option<String>,
  pub date_of_creation: Option<NaiveDate>,
  pub address_snippet:  Option<String>,
}

impl SearchItem {
  /// Hits with identifiers that do not normalise are dropped.
  pub fn into_candidate(self, term: &str) -> Option<Candidate> {
    let entity_id = normalize_entity_id(&self.company_number).ok()?;
    Some(Candidate {
      entity_id,
      rank: Some(match_score(&self.title, term)),
      name: self.title,
      status: self
        .company_status
        .as_deref()
        .map_or(EntityStatus::Unknown, EntityStatus::parse),
      incorporated_on: self.date_of_creation,
      address_snippet: self.address_snippet,
      source: CandidateSource::Registry,
    })
  }
}

// ─── Company profile ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompanyProfile {
  pub company_number:            String,
  pub company_name:              String,
  pub company_status:            Option<String>,
  #[serde(rename = "type")]
  pub company_type:              Option<String>,
  pub date_of_creation:          Option<NaiveDate>,
  pub date_of_cessation:         Option<NaiveDate>,
  pub jurisdiction:              Option<String>,
  pub registered_office_address: Option<Address>,
  #[serde(default)]
  pub sic_codes:                 Vec<String>,
}

impl CompanyProfile {
  pub fn into_remote(self, requested_id: &str) -> RemoteCompany {
    RemoteCompany {
      entity_id:            normalize_entity_id(&self.company_number)
        .unwrap_or_else(|_| requested_id.to_owned()),
      name:                 self.company_name,
      status:               self
        .company_status
        .as_deref()
        .map_or(EntityStatus::Unknown, EntityStatus::parse),
      legal_form:           self.company_type,
      incorporated_on:      self.date_of_creation,
      dissolved_on:         self.date_of_cessation,
      jurisdiction:         self.jurisdiction,
      registered_address:   self.registered_office_address.and_then(|a| a.snippet()),
      classification_codes: self.sic_codes,
    }
  }
}

// ─── Officers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OfficerList {
  #[serde(default)]
  pub items: Vec<OfficerItem>,
}

#[derive(Debug, Deserialize)]
pub struct OfficerItem {
  pub name:          String,
  pub officer_role:  Option<String>,
  pub appointed_on:  Option<NaiveDate>,
  pub resigned_on:   Option<NaiveDate>,
  pub date_of_birth: Option<DateOfBirth>,
  pub nationality:   Option<String>,
  pub address:       Option<Address>,
}

impl From<OfficerItem> for RemoteOfficer {
  fn from(o: OfficerItem) -> Self {
    RemoteOfficer {
      name:          o.name,
      role:          o.officer_role.as_deref().map_or(Role::Other, Role::parse),
      appointed_on:  o.appointed_on,
      ended_on:      o.resigned_on,
      born:          o.date_of_birth.as_ref().and_then(DateOfBirth::to_birth_month),
      nationality:   o.nationality,
      address:       o.address.and_then(|a| a.snippet()),
      corporate_id:  None,
      ownership_pct: None,
    }
  }
}

// ─── Persons with significant control ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PscList {
  #[serde(default)]
  pub items: Vec<PscItem>,
}

#[derive(Debug, Deserialize)]
pub struct Identification {
  pub registration_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PscItem {
  pub name:               Option<String>,
  pub kind:               Option<String>,
  pub notified_on:        Option<NaiveDate>,
  pub ceased_on:          Option<NaiveDate>,
  #[serde(default)]
  pub natures_of_control: Vec<String>,
  pub date_of_birth:      Option<DateOfBirth>,
  pub nationality:        Option<String>,
  pub address:            Option<Address>,
  pub identification:     Option<Identification>,
}

impl PscItem {
  /// Statements without a name (e.g. "no registrable person") are dropped.
  pub fn into_remote(self) -> Option<RemoteOfficer> {
    let name = self.name.filter(|n| !n.trim().is_empty())?;
    let is_corporate = self
      .kind
      .as_deref()
      .is_some_and(|k| k.contains("corporate-entity"));
    let corporate_id = is_corporate
      .then_some(self.identification)
      .flatten()
      .and_then(|i| i.registration_number)
      .and_then(|n| normalize_entity_id(&n).ok());

    Some(RemoteOfficer {
      name,
      role: Role::SignificantControl,
      appointed_on: self.notified_on,
      ended_on: self.ceased_on,
      born: self.date_of_birth.as_ref().and_then(DateOfBirth::to_birth_month),
      nationality: self.nationality,
      address: self.address.and_then(|a| a.snippet()),
      corporate_id,
      ownership_pct: ownership_lower_bound(&self.natures_of_control),
    })
  }
}

/// Lower bound of the highest share-ownership band among the nature-of-control
/// codes, e.g. `ownership-of-shares-25-to-50-percent` gives 25.
pub fn ownership_lower_bound(natures: &[String]) -> Option<f64> {
  natures
    .iter()
    .filter(|n| n.starts_with("ownership-of-shares"))
    .filter_map(|n| {
      n.split('-')
        .find_map(|part| part.parse::<u8>().ok())
        .map(f64::from)
    })
    .filter(|pct| (0.0..=100.0).contains(pct))
    .reduce(f64::max)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ownership_band_lower_bounds() {
    let natures = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    assert_eq!(
      ownership_lower_bound(&natures(&["ownership-of-shares-25-to-50-percent"])),
      Some(25.0)
    );
    assert_eq!(
      ownership_lower_bound(&natures(&[
        "voting-rights-75-to-100-percent",
        "ownership-of-shares-50-to-75-percent-as-trust",
        "ownership-of-shares-more-than-25-percent",
      ])),
      Some(50.0)
    );
    assert_eq!(ownership_lower_bound(&natures(&["right-to-appoint-and-remove-directors"])), None);
  }

  #[test]
  fn address_snippet_skips_blanks() {
    let a = Address {
      address_line_1: Some("1 High Street".into()),
      address_line_2: Some("  ".into()),
      locality: Some("London".into()),
      postal_code: Some("EC1A 1AA".into()),
      ..Default::default()
    };
    assert_eq!(a.snippet().as_deref(), Some("1 High Street, London, EC1A 1AA"));
    assert_eq!(Address::default().snippet(), None);
  }

  #[test]
  fn corporate_psc_carries_registration_number() {
    let json = r#"{
      "name": "Parent Holdings Ltd",
      "kind": "corporate-entity-person-with-significant-control",
      "notified_on": "2020-01-01",
      "natures_of_control": ["ownership-of-shares-75-to-100-percent"],
      "identification": { "registration_number": "sc12345" }
    }"#;
    let item: PscItem = serde_json::from_str(json).unwrap();
    let officer = item.into_remote().unwrap();
    assert_eq!(officer.corporate_id.as_deref(), Some("SC012345"));
    assert_eq!(officer.ownership_pct, Some(75.0));
    assert_eq!(officer.role, Role::SignificantControl);
  }

  #[test]
  fn profile_status_defaults_to_unknown() {
    let json = r#"{
      "company_number": "12345678",
      "company_name": "TechCorp Limited",
      "company_status": "mystery",
      "type": "ltd"
    }"#;
    let profile: CompanyProfile = serde_json::from_str(json).unwrap();
    let remote = profile.into_remote("12345678");
    assert_eq!(remote.status, EntityStatus::Unknown);
    assert!(remote.classification_codes.is_empty());
  }
}
