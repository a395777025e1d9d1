//! Translation of registry records into the cache's data model, and the
//! best-effort writes that store them.
//!
//! Write-back never fails a read: every store error is logged and counted,
//! and the caller still receives the translated records.

use chrono::{DateTime, Utc};
use regsync_core::{
  appointment::{Appointment, ResolvedAppointment},
  entity::Entity,
  person::Person,
  relationship::{CONTROLS, Relationship},
  store::CacheStore,
};
use regsync_registry::model::{RemoteCompany, RemoteOfficer};

// ─── Translation ─────────────────────────────────────────────────────────────

/// A registry profile becomes a synchronised entity. Appointment list stamps
/// are set by the caller once those lists are written.
pub fn entity_from_remote(remote: RemoteCompany, synced_at: DateTime<Utc>) -> Entity {
  Entity {
    entity_id:             remote.entity_id,
    name:                  remote.name,
    status:                remote.status,
    legal_form:            remote.legal_form,
    incorporated_on:       remote.incorporated_on,
    dissolved_on:          remote.dissolved_on,
    jurisdiction:          remote.jurisdiction,
    registered_address:    remote.registered_address,
    classification_codes:  remote.classification_codes.into_iter().collect(),
    last_synced_at:        Some(synced_at),
    officers_synced_at:    None,
    controllers_synced_at: None,
  }
}

pub fn resolve_officer(entity_id: &str, officer: &RemoteOfficer) -> ResolvedAppointment {
  let mut person = Person::new(officer.name.trim(), officer.born);
  person.nationality = officer.nationality.clone();
  person.address = officer.address.clone();

  ResolvedAppointment {
    appointment: Appointment {
      entity_id:  entity_id.to_owned(),
      person_key: person.person_key.clone(),
      role:       officer.role,
      started_on: officer.appointed_on,
      ended_on:   officer.ended_on,
    },
    person,
  }
}

/// A controller that is itself a registered company links the two entities.
pub fn controller_relationship(entity_id: &str, officer: &RemoteOfficer) -> Option<Relationship> {
  let from = officer.corporate_id.as_deref()?;
  if from == entity_id {
    return None;
  }
  let rel = Relationship::new(from, entity_id, CONTROLS);
  match officer.ownership_pct {
    Some(pct) => rel.with_ownership(pct).ok(),
    None => Some(rel),
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

pub async fn write_entity<S: CacheStore>(store: &S, entity: &Entity) -> bool {
  match store.upsert_entity(entity.clone()).await {
    Ok(()) => true,
    Err(e) => {
      tracing::warn!(entity_id = %entity.entity_id, error = %e, "entity write-back failed");
      false
    }
  }
}

/// Persons first, then the appointment that references them. Returns whether
/// every appointment is now stored, replays included.
pub async fn write_appointments<S: CacheStore>(
  store: &S,
  appointments: &[ResolvedAppointment],
) -> bool {
  let mut recorded = 0;
  let mut complete = true;
  for resolved in appointments {
    if let Err(e) = store.upsert_person(resolved.person.clone()).await {
      tracing::warn!(
        person_key = %resolved.person.person_key,
        error = %e,
        "person write-back failed"
      );
      complete = false;
      continue;
    }
    match store.upsert_appointment(resolved.appointment.clone()).await {
      Ok(true) => recorded += 1,
      Ok(false) => {}
      Err(e) => {
        tracing::warn!(
          entity_id = %resolved.appointment.entity_id,
          person_key = %resolved.appointment.person_key,
          error = %e,
          "appointment write-back failed"
        );
        complete = false;
      }
    }
  }
  tracing::debug!(recorded, total = appointments.len(), "appointments written back");
  complete
}

pub async fn write_relationships<S: CacheStore>(store: &S, relationships: &[Relationship]) {
  for rel in relationships {
    if let Err(e) = store.upsert_relationship(rel.clone()).await {
      tracing::warn!(
        from = %rel.from_entity,
        to = %rel.to_entity,
        error = %e,
        "relationship write-back failed"
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use regsync_core::{appointment::Role, entity::EntityStatus, person::BirthMonth};

  use super::*;

  fn officer(name: &str) -> RemoteOfficer {
    RemoteOfficer {
      name:          name.into(),
      role:          Role::SignificantControl,
      appointed_on:  None,
      ended_on:      None,
      born:          None,
      nationality:   None,
      address:       None,
      corporate_id:  None,
      ownership_pct: None,
    }
  }

  #[test]
  fn remote_company_is_stamped_as_synced() {
    let now = Utc::now();
    let remote = RemoteCompany {
      entity_id:            "12345678".into(),
      name:                 "TechCorp Limited".into(),
      status:               EntityStatus::Active,
      legal_form:           Some("ltd".into()),
      incorporated_on:      None,
      dissolved_on:         None,
      jurisdiction:         None,
      registered_address:   None,
      classification_codes: vec!["62020".into(), "62020".into()],
    };
    let entity = entity_from_remote(remote, now);
    assert_eq!(entity.last_synced_at, Some(now));
    assert_eq!(entity.classification_codes.len(), 1);
  }

  #[test]
  fn officer_key_includes_birth_month() {
    let mut o = officer("DOE, Jane");
    o.role = Role::Director;
    o.born = BirthMonth::new(1980, 4);
    let resolved = resolve_officer("12345678", &o);
    assert_eq!(resolved.person.person_key, "doe, jane|1980-04");
    assert_eq!(resolved.appointment.person_key, resolved.person.person_key);
    assert_eq!(resolved.appointment.role, Role::Director);
  }

  #[test]
  fn corporate_controller_becomes_relationship() {
    let mut o = officer("Parent Holdings Ltd");
    o.corporate_id = Some("SC012345".into());
    o.ownership_pct = Some(75.0);
    let rel = controller_relationship("12345678", &o).unwrap();
    assert_eq!(rel.from_entity, "SC012345");
    assert_eq!(rel.to_entity, "12345678");
    assert_eq!(rel.relationship_type, CONTROLS);
    assert_eq!(rel.ownership_pct, Some(75.0));
    assert_eq!(rel.confidence, 1.0);

    assert!(controller_relationship("12345678", &officer("Jane Doe")).is_none());
  }
}
