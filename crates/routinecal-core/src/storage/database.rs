//! SQLite storage for event mappings and workout logs.
//!
//! Provides persistent storage for:
//! - Occurrence-to-calendar-event mappings (the reconciliation join table)
//! - Workout completion logs

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::migrations;
use crate::error::{DatabaseError, Result};
use crate::integrations::traits::{MappingStore, WorkoutLogStore};
use crate::routine::{WorkoutKey, WorkoutLog};
use crate::sync::types::EventMapping;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite database behind the mapping and workout-log stores.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (creating if needed) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DatabaseError::Locked.into())
    }

    /// Every mapping of a user across routines.
    pub fn mappings_for_user(&self, user_id: &str) -> Result<Vec<EventMapping>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, routine_id, workout_id, event_date, external_event_id, created_at
             FROM event_mappings
             WHERE user_id = ?1
             ORDER BY routine_id, event_date, workout_id",
        )?;
        let rows = stmt.query_map(params![user_id], raw_mapping)?;
        collect_mappings(rows)
    }
}

/// Column values as stored, before date parsing.
struct RawMapping {
    id: String,
    user_id: String,
    routine_id: String,
    workout_id: String,
    event_date: String,
    external_event_id: String,
    created_at: String,
}

fn raw_mapping(row: &Row<'_>) -> rusqlite::Result<RawMapping> {
    Ok(RawMapping {
        id: row.get(0)?,
        user_id: row.get(1)?,
        routine_id: row.get(2)?,
        workout_id: row.get(3)?,
        event_date: row.get(4)?,
        external_event_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| DatabaseError::QueryFailed(format!("bad date '{value}': {e}")).into())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{value}': {e}")).into())
}

impl TryFrom<RawMapping> for EventMapping {
    type Error = crate::error::CoreError;

    fn try_from(raw: RawMapping) -> Result<Self> {
        Ok(EventMapping {
            event_date: parse_date(&raw.event_date)?,
            created_at: parse_timestamp(&raw.created_at)?,
            id: raw.id,
            user_id: raw.user_id,
            routine_id: raw.routine_id,
            workout_id: raw.workout_id,
            external_event_id: raw.external_event_id,
        })
    }
}

fn collect_mappings(
    rows: impl Iterator<Item = rusqlite::Result<RawMapping>>,
) -> Result<Vec<EventMapping>> {
    rows.map(|row| EventMapping::try_from(row?))
        .collect::<Result<Vec<_>>>()
}

impl MappingStore for Database {
    fn mappings_for_routine(&self, user_id: &str, routine_id: &str) -> Result<Vec<EventMapping>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, routine_id, workout_id, event_date, external_event_id, created_at
             FROM event_mappings
             WHERE user_id = ?1 AND routine_id = ?2
             ORDER BY event_date, workout_id",
        )?;
        let rows = stmt.query_map(params![user_id, routine_id], raw_mapping)?;
        collect_mappings(rows)
    }

    fn find_mapping(
        &self,
        user_id: &str,
        routine_id: &str,
        workout_id: &str,
        event_date: NaiveDate,
    ) -> Result<Option<EventMapping>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                "SELECT id, user_id, routine_id, workout_id, event_date, external_event_id, created_at
                 FROM event_mappings
                 WHERE user_id = ?1 AND routine_id = ?2 AND workout_id = ?3 AND event_date = ?4",
                params![
                    user_id,
                    routine_id,
                    workout_id,
                    event_date.format(DATE_FORMAT).to_string()
                ],
                raw_mapping,
            )
            .optional()?;
        raw.map(EventMapping::try_from).transpose()
    }

    fn insert_mapping(&self, mapping: &EventMapping) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO event_mappings
                (id, user_id, routine_id, workout_id, event_date, external_event_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                mapping.id,
                mapping.user_id,
                mapping.routine_id,
                mapping.workout_id,
                mapping.event_date.format(DATE_FORMAT).to_string(),
                mapping.external_event_id,
                mapping.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_mapping(&self, mapping_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM event_mappings WHERE id = ?1", params![mapping_id])?;
        Ok(removed > 0)
    }

    fn count_for_routine(&self, user_id: &str, routine_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM event_mappings WHERE user_id = ?1 AND routine_id = ?2",
            params![user_id, routine_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl WorkoutLogStore for Database {
    fn upsert_log(&self, log: &WorkoutLog) -> Result<()> {
        let exercise_ids = serde_json::to_string(&log.completed_exercise_ids)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO workout_logs
                (user_id, routine_id, workout_id, log_date, is_completed, completed_exercise_ids, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id, routine_id, workout_id, log_date) DO UPDATE SET
                is_completed = excluded.is_completed,
                completed_exercise_ids = excluded.completed_exercise_ids,
                updated_at = excluded.updated_at",
            params![
                log.user_id,
                log.routine_id,
                log.workout_id,
                log.date.format(DATE_FORMAT).to_string(),
                log.is_completed,
                exercise_ids,
                log.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_log(&self, key: &WorkoutKey) -> Result<Option<WorkoutLog>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT is_completed, completed_exercise_ids, updated_at
                 FROM workout_logs
                 WHERE user_id = ?1 AND routine_id = ?2 AND workout_id = ?3 AND log_date = ?4",
                params![
                    key.user_id,
                    key.routine_id,
                    key.workout_id,
                    key.date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, bool>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((is_completed, exercise_ids, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(WorkoutLog {
            user_id: key.user_id.clone(),
            routine_id: key.routine_id.clone(),
            workout_id: key.workout_id.clone(),
            date: key.date,
            is_completed,
            completed_exercise_ids: serde_json::from_str(&exercise_ids)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn mapping(id: &str, routine: &str, workout: &str, d: u32) -> EventMapping {
        EventMapping {
            id: id.into(),
            user_id: "u1".into(),
            routine_id: routine.into(),
            workout_id: workout.into(),
            event_date: date(d),
            external_event_id: format!("evt_{id}"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_find_and_list_mappings() {
        let db = Database::open_in_memory().unwrap();
        db.insert_mapping(&mapping("m2", "r1", "w1", 2)).unwrap();
        db.insert_mapping(&mapping("m1", "r1", "w0", 1)).unwrap();
        db.insert_mapping(&mapping("m3", "r2", "w0", 1)).unwrap();

        let listed = db.mappings_for_routine("u1", "r1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "m1");
        assert_eq!(listed[1].event_date, date(2));

        let found = db.find_mapping("u1", "r1", "w1", date(2)).unwrap().unwrap();
        assert_eq!(found.external_event_id, "evt_m2");
        assert!(db.find_mapping("u1", "r1", "w1", date(3)).unwrap().is_none());

        assert_eq!(db.count_for_routine("u1", "r1").unwrap(), 2);
        assert_eq!(db.count_for_routine("u2", "r1").unwrap(), 0);
        assert_eq!(db.mappings_for_user("u1").unwrap().len(), 3);
    }

    #[test]
    fn duplicate_key_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.insert_mapping(&mapping("m1", "r1", "w0", 1)).unwrap();
        let err = db.insert_mapping(&mapping("m2", "r1", "w0", 1)).unwrap_err();
        assert!(matches!(err, CoreError::Database(DatabaseError::Conflict(_))));
    }

    #[test]
    fn delete_mapping_reports_removal() {
        let db = Database::open_in_memory().unwrap();
        db.insert_mapping(&mapping("m1", "r1", "w0", 1)).unwrap();
        assert!(db.delete_mapping("m1").unwrap());
        assert!(!db.delete_mapping("m1").unwrap());
        assert_eq!(db.count_for_routine("u1", "r1").unwrap(), 0);
    }

    #[test]
    fn workout_log_upsert_overwrites() {
        let db = Database::open_in_memory().unwrap();
        let mut log = WorkoutLog {
            user_id: "u1".into(),
            routine_id: "r1".into(),
            workout_id: "w0".into(),
            date: date(1),
            is_completed: true,
            completed_exercise_ids: vec!["e1".into(), "e2".into()],
            updated_at: Utc::now(),
        };
        db.upsert_log(&log).unwrap();

        log.is_completed = false;
        db.upsert_log(&log).unwrap();

        let stored = db.get_log(&log.key()).unwrap().unwrap();
        assert!(!stored.is_completed);
        assert_eq!(stored.completed_exercise_ids, vec!["e1", "e2"]);

        let other = WorkoutKey::new("u1", "r1", "w0", date(2));
        assert!(db.get_log(&other).unwrap().is_none());
    }

    #[test]
    fn file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routinecal.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_mapping(&mapping("m1", "r1", "w0", 1)).unwrap();
            assert_eq!(db.path(), Some(path.as_path()));
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.count_for_routine("u1", "r1").unwrap(), 1);
    }
}
