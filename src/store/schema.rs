use rusqlite::Connection;

use crate::error::Result;

/// Tables and identity indexes for the canonical build history.
///
/// `CHECK`s reject blank identities so a bad observation aborts its batch
/// instead of creating an unaddressable row.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pipelines (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    provider   TEXT    NOT NULL,
    name       TEXT    NOT NULL CHECK (length(name) > 0),
    url        TEXT,
    active     INTEGER NOT NULL DEFAULT 1
);

CREATE UNIQUE INDEX IF NOT EXISTS pipelines_identity
    ON pipelines (provider, name);

CREATE TABLE IF NOT EXISTS builds (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    pipeline_id      INTEGER NOT NULL REFERENCES pipelines (id) ON DELETE CASCADE,
    external_id      TEXT    NOT NULL CHECK (length(external_id) > 0),
    status           TEXT    NOT NULL,
    started_at       TEXT,
    finished_at      TEXT,
    duration_seconds INTEGER,
    web_url          TEXT,
    event_source     TEXT,
    logs             TEXT,
    created_at       TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE UNIQUE INDEX IF NOT EXISTS builds_identity
    ON builds (pipeline_id, external_id);

CREATE INDEX IF NOT EXISTS builds_started_at
    ON builds (started_at);
";

pub(super) fn bootstrap(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Pragmas for a file-backed database shared by a writer and a reader.
pub(super) fn configure_file_connection(conn: &Connection) -> Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    log::debug!("SQLite journal mode: {mode}");
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    configure_connection(conn)
}

pub(super) fn configure_connection(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}
