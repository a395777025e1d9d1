//! Person — an officer or controlling individual.
//!
//! Registries do not publish a stable person identifier, so the natural key
//! is derived from the name. A bare name key merges distinct people who share
//! a name; when a birth month is known it is folded into the key to narrow
//! that collision.

use serde::{Deserialize, Serialize};

/// Month-granularity date of birth, the most the registry discloses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BirthMonth {
  pub year:  i32,
  pub month: u32,
}

impl BirthMonth {
  /// Returns `None` for out-of-range months.
  pub fn new(year: i32, month: u32) -> Option<Self> {
    (1..=12).contains(&month).then_some(Self { year, month })
  }
}

/// Case- and whitespace-folded form of a full name.
pub fn normalize_name(name: &str) -> String {
  name
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

/// Natural key for a person: the normalised name, widened with `|YYYY-MM`
/// when a birth month is known.
pub fn person_key(name: &str, born: Option<BirthMonth>) -> String {
  let name = normalize_name(name);
  match born {
    Some(b) => format!("{name}|{:04}-{:02}", b.year, b.month),
    None => name,
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
  pub person_key:  String,
  pub full_name:   String,
  pub born:        Option<BirthMonth>,
  pub nationality: Option<String>,
  pub address:     Option<String>,
}

impl Person {
  pub fn new(full_name: impl Into<String>, born: Option<BirthMonth>) -> Self {
    let full_name = full_name.into();
    Self {
      person_key: person_key(&full_name, born),
      full_name,
      born,
      nationality: None,
      address: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn name_folding_ignores_case_and_spacing() {
    assert_eq!(normalize_name("  SMITH,   John\tRobert "), "smith, john robert");
    assert_eq!(person_key("Jane DOE", None), person_key("jane   doe", None));
  }

  #[test]
  fn birth_month_widens_key() {
    let a = person_key("Jane Doe", BirthMonth::new(1980, 4));
    let b = person_key("Jane Doe", BirthMonth::new(1991, 11));
    assert_eq!(a, "jane doe|1980-04");
    assert_ne!(a, b);
  }

  #[test]
  fn rejects_bad_month() {
    assert!(BirthMonth::new(1980, 0).is_none());
    assert!(BirthMonth::new(1980, 13).is_none());
  }
}
