//! SQL schema for the registry cache.
//!
//! Executed once at connection startup. Older files are brought forward by
//! the steps gated on `PRAGMA user_version`.

use rusqlite::{Connection, functions::FunctionFlags};

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS entities (
    entity_id             TEXT PRIMARY KEY, -- normalised registry identifier
    name                  TEXT NOT NULL,
    status                TEXT NOT NULL DEFAULT 'unknown',
    legal_form            TEXT,
    incorporated_on       TEXT,             -- YYYY-MM-DD
    dissolved_on          TEXT,
    jurisdiction          TEXT,
    registered_address    TEXT,
    classification_codes  TEXT NOT NULL DEFAULT '[]',
    last_synced_at        TEXT,             -- NULL for search-seeded rows
    officers_synced_at    TEXT,             -- NULL until the officer list is fetched
    controllers_synced_at TEXT              -- NULL until the controller list is fetched
);

CREATE TABLE IF NOT EXISTS persons (
    person_key  TEXT PRIMARY KEY,           -- folded name [|YYYY-MM]
    full_name   TEXT NOT NULL,
    born        TEXT,                       -- YYYY-MM
    nationality TEXT,
    address     TEXT
);

-- Appointments are never overwritten; a key collision is ignored.
-- An unknown start date is stored as '' so it still takes part in the key.
CREATE TABLE IF NOT EXISTS appointments (
    entity_id   TEXT NOT NULL REFERENCES entities(entity_id),
    person_key  TEXT NOT NULL REFERENCES persons(person_key),
    role        TEXT NOT NULL,
    started_on  TEXT NOT NULL DEFAULT '',
    ended_on    TEXT,
    PRIMARY KEY (entity_id, person_key, role, started_on)
);

-- `from_entity` may be a company that was never fetched itself.
CREATE TABLE IF NOT EXISTS relationships (
    from_entity       TEXT NOT NULL,
    to_entity         TEXT NOT NULL,
    relationship_type TEXT NOT NULL,
    ownership_pct     REAL CHECK (ownership_pct IS NULL OR ownership_pct BETWEEN 0 AND 100),
    confidence        REAL NOT NULL DEFAULT 1.0 CHECK (confidence BETWEEN 0 AND 1),
    PRIMARY KEY (from_entity, to_entity, relationship_type)
);

-- Only the current quota day is kept; admission prunes older rows.
CREATE TABLE IF NOT EXISTS request_log (
    request_id   TEXT PRIMARY KEY,
    caller_id    TEXT NOT NULL,
    requested_at TEXT NOT NULL              -- fixed-width RFC 3339, sortable
);

CREATE INDEX IF NOT EXISTS entities_name_idx       ON entities(name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS appointments_person_idx ON appointments(person_key);
CREATE INDEX IF NOT EXISTS relationships_to_idx    ON relationships(to_entity);
CREATE INDEX IF NOT EXISTS request_log_caller_idx  ON request_log(caller_id, requested_at);
CREATE INDEX IF NOT EXISTS request_log_time_idx    ON request_log(requested_at);

PRAGMA user_version = 2;
";

/// Version 1 files predate per-list sync stamps.
const MIGRATE_FROM_V1: &str = "
ALTER TABLE entities ADD COLUMN officers_synced_at TEXT;
ALTER TABLE entities ADD COLUMN controllers_synced_at TEXT;
";

/// Name of the SQL function used for case-insensitive name matching.
pub const FOLD_CASE: &str = "fold_case";

/// Prepare a freshly opened connection: register [`FOLD_CASE`], migrate older
/// files, then apply [`SCHEMA`].
///
/// SQLite's built-in `lower()` only folds ASCII, so names are folded with
/// Rust's Unicode lowercasing on the same side as the search term.
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    FOLD_CASE,
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
  )?;

  let version: i64 = conn.pragma_query_value(None, "user_version", |r| r.get(0))?;
  if version == 1 {
    tracing::info!("migrating cache schema from version 1");
    conn.execute_batch(MIGRATE_FROM_V1)?;
  }
  conn.execute_batch(SCHEMA)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn version_one_file_gains_sync_stamp_columns() {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch(
        "CREATE TABLE entities (
           entity_id TEXT PRIMARY KEY, name TEXT NOT NULL,
           status TEXT NOT NULL DEFAULT 'unknown', legal_form TEXT,
           incorporated_on TEXT, dissolved_on TEXT, jurisdiction TEXT,
           registered_address TEXT, classification_codes TEXT NOT NULL DEFAULT '[]',
           last_synced_at TEXT
         );
         INSERT INTO entities (entity_id, name) VALUES ('12345678', 'TechCorp Limited');
         PRAGMA user_version = 1;",
      )
      .unwrap();

    init(&conn).unwrap();

    let version: i64 = conn.pragma_query_value(None, "user_version", |r| r.get(0)).unwrap();
    assert_eq!(version, 2);
    let stamp: Option<String> = conn
      .query_row(
        "SELECT officers_synced_at FROM entities WHERE entity_id = '12345678'",
        [],
        |r| r.get(0),
      )
      .unwrap();
    assert_eq!(stamp, None);
  }

  #[test]
  fn fold_case_handles_non_ascii_capitals() {
    let conn = Connection::open_in_memory().unwrap();
    init(&conn).unwrap();
    let folded: String = conn
      .query_row("SELECT fold_case('ÉCOLE SERVICES LTD')", [], |r| r.get(0))
      .unwrap();
    assert_eq!(folded, "école services ltd");
  }
}
