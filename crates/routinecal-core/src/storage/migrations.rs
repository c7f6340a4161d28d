//! Database schema migrations for routinecal.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{debug, warn};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const CURRENT_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current version, 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    debug!(version, "schema migrated");
    Ok(())
}

/// Migration v1: event mappings.
///
/// One row per scheduled workout that has a live calendar event. The
/// unique index is what turns a duplicate insert into a conflict.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS event_mappings (
            id                TEXT PRIMARY KEY,
            user_id           TEXT NOT NULL,
            routine_id        TEXT NOT NULL,
            workout_id        TEXT NOT NULL,
            event_date        TEXT NOT NULL,
            external_event_id TEXT NOT NULL,
            created_at        TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_event_mappings_key
            ON event_mappings(user_id, routine_id, workout_id, event_date);
        CREATE INDEX IF NOT EXISTS idx_event_mappings_routine
            ON event_mappings(user_id, routine_id);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: workout completion logs.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS workout_logs (
            user_id                TEXT NOT NULL,
            routine_id             TEXT NOT NULL,
            workout_id             TEXT NOT NULL,
            log_date               TEXT NOT NULL,
            is_completed           INTEGER NOT NULL DEFAULT 0,
            completed_exercise_ids TEXT NOT NULL DEFAULT '[]',
            updated_at             TEXT NOT NULL,
            PRIMARY KEY (user_id, routine_id, workout_id, log_date)
        );",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
