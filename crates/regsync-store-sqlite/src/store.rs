//! [`SqliteStore`] — the SQLite implementation of [`CacheStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use regsync_core::{
  appointment::{Appointment, ResolvedAppointment},
  entity::{Entity, normalize_entity_id},
  person::Person,
  relationship::Relationship,
  store::{Admission, CacheStore, StoreStats},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ENTITY_COLUMNS, RawEntity, RawRelationship, RawResolvedAppointment, encode_birth, encode_date,
    encode_dt, encode_role, encode_start_date,
  },
  schema::{self, FOLD_CASE},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A registry cache backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// are serialised onto the connection's thread, which is what makes
/// [`CacheStore::admit_request`] atomic.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        schema::init(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Every column is replaced on conflict, sync stamps included.
const ENTITY_OVERWRITE: &str = "DO UPDATE SET
   name                  = excluded.name,
   status                = excluded.status,
   legal_form            = excluded.legal_form,
   incorporated_on       = excluded.incorporated_on,
   dissolved_on          = excluded.dissolved_on,
   jurisdiction          = excluded.jurisdiction,
   registered_address    = excluded.registered_address,
   classification_codes  = excluded.classification_codes,
   last_synced_at        = excluded.last_synced_at,
   officers_synced_at    = excluded.officers_synced_at,
   controllers_synced_at = excluded.controllers_synced_at";

fn insert_entity(
  conn: &rusqlite::Connection,
  raw: &RawEntity,
  on_conflict: &str,
) -> rusqlite::Result<usize> {
  conn.execute(
    &format!(
      "INSERT INTO entities ({ENTITY_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
       ON CONFLICT (entity_id) {on_conflict}"
    ),
    rusqlite::params![
      raw.entity_id,
      raw.name,
      raw.status,
      raw.legal_form,
      raw.incorporated_on,
      raw.dissolved_on,
      raw.jurisdiction,
      raw.registered_address,
      raw.classification_codes,
      raw.last_synced_at,
      raw.officers_synced_at,
      raw.controllers_synced_at,
    ],
  )
}

/// Escape `LIKE` metacharacters; pairs with `ESCAPE '\'`.
fn escape_like(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

// ─── CacheStore impl ─────────────────────────────────────────────────────────

impl CacheStore for SqliteStore {
  type Error = crate::Error;

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn get_entity(&self, entity_id: &str) -> Result<Option<Entity>> {
    let id = entity_id.to_owned();

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = ?1"),
              rusqlite::params![id],
              RawEntity::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn upsert_entity(&self, entity: Entity) -> Result<()> {
    let raw = RawEntity::encode(&entity)?;

    self
      .conn
      .call(move |conn| {
        insert_entity(conn, &raw, ENTITY_OVERWRITE)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn seed_entity(&self, entity: Entity) -> Result<bool> {
    let raw = RawEntity::encode(&entity)?;

    let written = self
      .conn
      .call(move |conn| Ok(insert_entity(conn, &raw, "DO NOTHING")? > 0))
      .await?;
    Ok(written)
  }

  async fn search_entities(&self, term: &str, limit: usize) -> Result<Vec<Entity>> {
    let term = term.trim();
    let name_folded = term.to_lowercase();
    let name_pattern = format!("%{}%", escape_like(&name_folded));
    let name_prefix = format!("{}%", escape_like(&name_folded));

    // Identifier matching works on the folded form; a term with no
    // alphanumerics never matches an identifier.
    let id_folded: String = term
      .chars()
      .filter(char::is_ascii_alphanumeric)
      .map(|c| c.to_ascii_uppercase())
      .collect();
    let id_pattern = (!id_folded.is_empty()).then(|| format!("%{}%", escape_like(&id_folded)));
    let id_exact = normalize_entity_id(term).ok();
    let limit_val = limit as i64;

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {ENTITY_COLUMNS}
           FROM entities
           WHERE {FOLD_CASE}(name) LIKE ?1 ESCAPE '\\'
              OR entity_id LIKE ?2 ESCAPE '\\'
              OR entity_id = ?3
           ORDER BY
             CASE WHEN entity_id = ?3 OR {FOLD_CASE}(name) LIKE ?4 ESCAPE '\\' THEN 0 ELSE 1 END,
             name COLLATE NOCASE,
             entity_id
           LIMIT ?5"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![name_pattern, id_pattern, id_exact, name_prefix, limit_val],
            RawEntity::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  // ── People and appointments ───────────────────────────────────────────────

  async fn upsert_person(&self, person: Person) -> Result<()> {
    let born = person.born.map(encode_birth);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO persons (person_key, full_name, born, nationality, address)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (person_key) DO UPDATE SET
             full_name   = excluded.full_name,
             born        = excluded.born,
             nationality = excluded.nationality,
             address     = excluded.address",
          rusqlite::params![
            person.person_key,
            person.full_name,
            born,
            person.nationality,
            person.address,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_appointment(&self, appointment: Appointment) -> Result<bool> {
    let role = encode_role(appointment.role);
    let started_on = encode_start_date(appointment.started_on);
    let ended_on = appointment.ended_on.map(encode_date);

    let written = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO appointments (entity_id, person_key, role, started_on, ended_on)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT DO NOTHING",
          rusqlite::params![
            appointment.entity_id,
            appointment.person_key,
            role,
            started_on,
            ended_on,
          ],
        )?;
        Ok(n > 0)
      })
      .await?;
    Ok(written)
  }

  async fn appointments_for(&self, entity_id: &str) -> Result<Vec<ResolvedAppointment>> {
    let id = entity_id.to_owned();

    let raws: Vec<RawResolvedAppointment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             a.entity_id, a.person_key, a.role, a.started_on, a.ended_on,
             p.full_name, p.born, p.nationality, p.address
           FROM appointments a
           JOIN persons p ON p.person_key = a.person_key
           WHERE a.entity_id = ?1
           ORDER BY a.ended_on IS NOT NULL, a.role, p.full_name COLLATE NOCASE",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawResolvedAppointment {
              entity_id:   row.get(0)?,
              person_key:  row.get(1)?,
              role:        row.get(2)?,
              started_on:  row.get(3)?,
              ended_on:    row.get(4)?,
              full_name:   row.get(5)?,
              born:        row.get(6)?,
              nationality: row.get(7)?,
              address:     row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawResolvedAppointment::into_resolved)
      .collect()
  }

  // ── Relationships ─────────────────────────────────────────────────────────

  async fn upsert_relationship(&self, relationship: Relationship) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO relationships
             (from_entity, to_entity, relationship_type, ownership_pct, confidence)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (from_entity, to_entity, relationship_type) DO UPDATE SET
             ownership_pct = excluded.ownership_pct,
             confidence    = excluded.confidence",
          rusqlite::params![
            relationship.from_entity,
            relationship.to_entity,
            relationship.relationship_type,
            relationship.ownership_pct,
            relationship.confidence,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn relationships_for(&self, entity_id: &str) -> Result<Vec<Relationship>> {
    let id = entity_id.to_owned();

    let raws: Vec<RawRelationship> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT from_entity, to_entity, relationship_type, ownership_pct, confidence
           FROM relationships
           WHERE from_entity = ?1 OR to_entity = ?1
           ORDER BY from_entity, to_entity, relationship_type",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id], |row| {
            Ok(RawRelationship {
              from_entity:       row.get(0)?,
              to_entity:         row.get(1)?,
              relationship_type: row.get(2)?,
              ownership_pct:     row.get(3)?,
              confidence:        row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRelationship::into_relationship).collect()
  }

  // ── Request log ───────────────────────────────────────────────────────────

  async fn count_requests(&self, caller: &str, since: DateTime<Utc>) -> Result<u32> {
    let caller = caller.to_owned();
    let since_str = encode_dt(since);

    let count = self
      .conn
      .call(move |conn| {
        let n: i64 = conn.query_row(
          "SELECT COUNT(*) FROM request_log WHERE caller_id = ?1 AND requested_at >= ?2",
          rusqlite::params![caller, since_str],
          |r| r.get(0),
        )?;
        Ok(n as u32)
      })
      .await?;
    Ok(count)
  }

  async fn admit_request(
    &self,
    caller: &str,
    at: DateTime<Utc>,
    since: DateTime<Utc>,
    ceiling: Option<u32>,
  ) -> Result<Admission> {
    let caller = caller.to_owned();
    let at_str = encode_dt(at);
    let since_str = encode_dt(since);
    let request_id = Uuid::new_v4().hyphenated().to_string();

    let admission = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Rows from before the window can never count again.
        let pruned = tx.execute(
          "DELETE FROM request_log WHERE requested_at < ?1",
          rusqlite::params![since_str],
        )?;
        if pruned > 0 {
          tracing::debug!(pruned, "pruned expired request log rows");
        }
        let used: i64 = tx.query_row(
          "SELECT COUNT(*) FROM request_log WHERE caller_id = ?1 AND requested_at >= ?2",
          rusqlite::params![caller, since_str],
          |r| r.get(0),
        )?;
        let used = used as u32;

        if ceiling.is_some_and(|max| used >= max) {
          tx.commit()?;
          return Ok(Admission::Denied { used });
        }

        tx.execute(
          "INSERT INTO request_log (request_id, caller_id, requested_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![request_id, caller, at_str],
        )?;
        tx.commit()?;
        Ok(Admission::Admitted { used: used + 1 })
      })
      .await?;

    tracing::trace!(?admission, "request admission");
    Ok(admission)
  }

  // ── Health ────────────────────────────────────────────────────────────────

  async fn stats(&self) -> Result<StoreStats> {
    let stats = self
      .conn
      .call(|conn| {
        let count = |table: &str| -> rusqlite::Result<u64> {
          conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get::<_, i64>(0))
            .map(|n| n as u64)
        };
        Ok(StoreStats {
          entities:      count("entities")?,
          persons:       count("persons")?,
          appointments:  count("appointments")?,
          relationships: count("relationships")?,
        })
      })
      .await?;
    Ok(stats)
  }
}
