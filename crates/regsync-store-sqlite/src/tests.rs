//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use regsync_core::{
  appointment::{Appointment, Role},
  entity::{Entity, EntityStatus},
  person::{BirthMonth, Person},
  relationship::{CONTROLS, Relationship},
  store::{Admission, CacheStore},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn techcorp() -> Entity {
  let mut e = Entity::new("12345678", "TechCorp Limited");
  e.status = EntityStatus::Active;
  e.legal_form = Some("ltd".into());
  e.incorporated_on = NaiveDate::from_ymd_opt(2015, 3, 2);
  e.jurisdiction = Some("england-wales".into());
  e.registered_address = Some("1 High Street, London, EC1A 1AA".into());
  e.classification_codes = ["62020".to_string(), "62090".to_string()].into();
  e.last_synced_at = Some(Utc::now());
  e
}

fn appointment(entity_id: &str, person: &Person, role: Role) -> Appointment {
  Appointment {
    entity_id:  entity_id.into(),
    person_key: person.person_key.clone(),
    role,
    started_on: NaiveDate::from_ymd_opt(2019, 1, 7),
    ended_on:   None,
  }
}

// ─── Entities ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_and_get_entity() {
  let s = store().await;
  let entity = techcorp();
  s.upsert_entity(entity.clone()).await.unwrap();

  let fetched = s.get_entity("12345678").await.unwrap().unwrap();
  assert_eq!(fetched.name, "TechCorp Limited");
  assert_eq!(fetched.status, EntityStatus::Active);
  assert_eq!(fetched.classification_codes.len(), 2);
  assert_eq!(fetched.incorporated_on, entity.incorporated_on);
}

#[tokio::test]
async fn get_entity_missing_returns_none() {
  let s = store().await;
  assert!(s.get_entity("00000001").await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_is_idempotent_and_last_write_wins() {
  let s = store().await;
  let first = techcorp();
  s.upsert_entity(first.clone()).await.unwrap();
  s.upsert_entity(first.clone()).await.unwrap();

  let mut second = first.clone();
  second.name = "TechCorp Holdings Limited".into();
  second.status = EntityStatus::InLiquidation;
  second.legal_form = None;
  s.upsert_entity(second.clone()).await.unwrap();

  assert_eq!(s.stats().await.unwrap().entities, 1);
  let fetched = s.get_entity("12345678").await.unwrap().unwrap();
  assert_eq!(fetched.name, "TechCorp Holdings Limited");
  assert_eq!(fetched.status, EntityStatus::InLiquidation);
  // Full overwrite: absent attributes are cleared, not merged.
  assert_eq!(fetched.legal_form, None);
}

#[tokio::test]
async fn seed_never_overwrites_synced_entity() {
  let s = store().await;
  s.upsert_entity(techcorp()).await.unwrap();

  let seeded = s
    .seed_entity(Entity::new("12345678", "Techcorp"))
    .await
    .unwrap();
  assert!(!seeded);
  let fetched = s.get_entity("12345678").await.unwrap().unwrap();
  assert_eq!(fetched.name, "TechCorp Limited");
  assert!(fetched.last_synced_at.is_some());

  assert!(s.seed_entity(Entity::new("99999999", "Tech Innovators")).await.unwrap());
  let seeded = s.get_entity("99999999").await.unwrap().unwrap();
  assert!(seeded.last_synced_at.is_none());
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_ranks_prefix_before_substring() {
  let s = store().await;
  for (id, name) in [
    ("00000001", "Advanced Tech Systems"),
    ("00000002", "Technica Ltd"),
    ("00000003", "Biotech Partners"),
    ("00000004", "TechCorp Limited"),
    ("00000005", "Unrelated Plc"),
  ] {
    s.upsert_entity(Entity::new(id, name)).await.unwrap();
  }

  let names: Vec<String> = s
    .search_entities("tech", 10)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.name)
    .collect();
  assert_eq!(
    names,
    ["TechCorp Limited", "Technica Ltd", "Advanced Tech Systems", "Biotech Partners"]
  );
}

#[tokio::test]
async fn search_matches_identifier_and_respects_limit() {
  let s = store().await;
  s.upsert_entity(Entity::new("SC012345", "Highland Widgets")).await.unwrap();
  s.upsert_entity(Entity::new("12345678", "Alpha Widgets")).await.unwrap();
  s.upsert_entity(Entity::new("00123456", "Beta Widgets")).await.unwrap();

  let hits = s.search_entities("sc012345", 10).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].entity_id, "SC012345");

  // Exact identifier match sorts ahead of other substring matches.
  let hits = s.search_entities("123456", 10).await.unwrap();
  assert_eq!(hits[0].entity_id, "00123456");
  assert_eq!(hits.len(), 2);

  let hits = s.search_entities("widgets", 2).await.unwrap();
  assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn search_treats_like_metacharacters_literally() {
  let s = store().await;
  s.upsert_entity(Entity::new("00000001", "100% Organic Ltd")).await.unwrap();
  s.upsert_entity(Entity::new("00000002", "Organic Foods Ltd")).await.unwrap();

  let hits = s.search_entities("100%", 10).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].name, "100% Organic Ltd");

  assert!(s.search_entities("_", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_folds_non_ascii_capitals() {
  let s = store().await;
  s.upsert_entity(Entity::new("00000001", "ÉCOLE SERVICES LTD")).await.unwrap();
  s.upsert_entity(Entity::new("00000002", "Ökobau GmbH Ltd")).await.unwrap();

  let hits = s.search_entities("école", 5).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].entity_id, "00000001");

  let hits = s.search_entities("ÖKO", 5).await.unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].name, "Ökobau GmbH Ltd");
}

#[tokio::test]
async fn appointment_sync_stamps_round_trip() {
  let s = store().await;
  let mut entity = techcorp();
  entity.officers_synced_at = entity.last_synced_at;
  s.upsert_entity(entity.clone()).await.unwrap();

  let fetched = s.get_entity("12345678").await.unwrap().unwrap();
  assert_eq!(fetched.officers_synced_at, entity.last_synced_at);
  assert_eq!(fetched.controllers_synced_at, None);

  // Overwrite clears a stamp the new record does not carry.
  s.upsert_entity(techcorp()).await.unwrap();
  let fetched = s.get_entity("12345678").await.unwrap().unwrap();
  assert_eq!(fetched.officers_synced_at, None);
}

// ─── People and appointments ─────────────────────────────────────────────────

#[tokio::test]
async fn appointment_replay_does_not_duplicate() {
  let s = store().await;
  s.upsert_entity(techcorp()).await.unwrap();
  let mut person = Person::new("DOE, Jane", BirthMonth::new(1980, 4));
  person.nationality = Some("British".into());
  s.upsert_person(person.clone()).await.unwrap();

  let appt = appointment("12345678", &person, Role::Director);
  assert!(s.upsert_appointment(appt.clone()).await.unwrap());
  assert!(!s.upsert_appointment(appt.clone()).await.unwrap());

  // A conflicting write with an end date is ignored, not applied.
  let mut resigned = appt.clone();
  resigned.ended_on = NaiveDate::from_ymd_opt(2023, 6, 30);
  assert!(!s.upsert_appointment(resigned).await.unwrap());

  let appts = s.appointments_for("12345678").await.unwrap();
  assert_eq!(appts.len(), 1);
  assert!(appts[0].appointment.is_active());
  assert_eq!(appts[0].person.born, BirthMonth::new(1980, 4));
  assert_eq!(appts[0].person.nationality.as_deref(), Some("British"));
}

#[tokio::test]
async fn appointments_with_unknown_start_are_keyed() {
  let s = store().await;
  s.upsert_entity(techcorp()).await.unwrap();
  let person = Person::new("Acme Nominees Limited", None);
  s.upsert_person(person.clone()).await.unwrap();

  let mut appt = appointment("12345678", &person, Role::Secretary);
  appt.started_on = None;
  assert!(s.upsert_appointment(appt.clone()).await.unwrap());
  assert!(!s.upsert_appointment(appt).await.unwrap());

  let appts = s.appointments_for("12345678").await.unwrap();
  assert_eq!(appts.len(), 1);
  assert_eq!(appts[0].appointment.started_on, None);
}

#[tokio::test]
async fn same_person_distinct_roles_are_distinct_appointments() {
  let s = store().await;
  s.upsert_entity(techcorp()).await.unwrap();
  let person = Person::new("John Smith", None);
  s.upsert_person(person.clone()).await.unwrap();

  s.upsert_appointment(appointment("12345678", &person, Role::Director)).await.unwrap();
  s.upsert_appointment(appointment("12345678", &person, Role::SignificantControl))
    .await
    .unwrap();

  assert_eq!(s.appointments_for("12345678").await.unwrap().len(), 2);
  assert_eq!(s.stats().await.unwrap().persons, 1);
}

// ─── Relationships ───────────────────────────────────────────────────────────

#[tokio::test]
async fn relationship_upsert_overwrites_by_composite_key() {
  let s = store().await;
  let rel = Relationship::new("SC000001", "12345678", CONTROLS)
    .with_ownership(25.0)
    .unwrap();
  s.upsert_relationship(rel.clone()).await.unwrap();
  s.upsert_relationship(rel.with_ownership(75.0).unwrap()).await.unwrap();

  let rels = s.relationships_for("12345678").await.unwrap();
  assert_eq!(rels.len(), 1);
  assert_eq!(rels[0].ownership_pct, Some(75.0));
  assert_eq!(rels[0].confidence, 1.0);

  // Visible from the other end too.
  assert_eq!(s.relationships_for("SC000001").await.unwrap().len(), 1);
}

// ─── Request log ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn admit_request_stops_at_ceiling() {
  let s = store().await;
  let day_start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
  let at = day_start + Duration::hours(9);

  for expected in 1..=3 {
    let admission = s.admit_request("caller-a", at, day_start, Some(3)).await.unwrap();
    assert_eq!(admission, Admission::Admitted { used: expected });
  }
  let denied = s.admit_request("caller-a", at, day_start, Some(3)).await.unwrap();
  assert_eq!(denied, Admission::Denied { used: 3 });

  // Denials are not logged, other callers are unaffected.
  assert_eq!(s.count_requests("caller-a", day_start).await.unwrap(), 3);
  assert_eq!(s.count_requests("caller-b", day_start).await.unwrap(), 0);
}

#[tokio::test]
async fn admit_request_unlimited_and_windowed() {
  let s = store().await;
  let yesterday = Utc.with_ymd_and_hms(2024, 4, 30, 23, 30, 0).unwrap();
  let today = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

  for _ in 0..10 {
    s.admit_request("caller-a", yesterday, yesterday, None).await.unwrap();
  }
  assert_eq!(s.count_requests("caller-a", today).await.unwrap(), 0);
  let admission = s.admit_request("caller-a", today, today, Some(1)).await.unwrap();
  assert_eq!(admission, Admission::Admitted { used: 1 });
}

#[tokio::test]
async fn admission_prunes_rows_before_the_window() {
  let s = store().await;
  let yesterday = Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap();
  let today = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

  for caller in ["caller-a", "caller-b"] {
    for _ in 0..3 {
      s.admit_request(caller, yesterday + Duration::hours(12), yesterday, Some(10))
        .await
        .unwrap();
    }
  }
  assert_eq!(s.count_requests("caller-b", yesterday).await.unwrap(), 3);

  s.admit_request("caller-a", today + Duration::hours(1), today, Some(10))
    .await
    .unwrap();

  // Yesterday's rows are gone for every caller, today's row stays.
  assert_eq!(s.count_requests("caller-a", yesterday).await.unwrap(), 1);
  assert_eq!(s.count_requests("caller-b", yesterday).await.unwrap(), 0);
}
