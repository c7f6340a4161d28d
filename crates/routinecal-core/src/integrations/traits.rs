//! Collaborator interfaces used by the sync engine.
//!
//! The engine never reaches a calendar, routine source or store directly;
//! everything goes through these traits so tests can swap in fakes.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{ProviderError, Result};
use crate::routine::{Routine, WorkoutKey, WorkoutLog};
use crate::sync::types::{CalendarEvent, EventMapping, EventPatch};

/// An external calendar service.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Short identifier used in logs (e.g. "google", "memory").
    fn name(&self) -> &str;

    /// Create an event and return its provider-assigned id.
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, ProviderError>;

    /// Apply a partial update and return the event as stored afterwards.
    async fn update_event(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent, ProviderError>;

    /// Delete an event. `Ok(false)` means it was already gone.
    async fn delete_event(&self, event_id: &str) -> Result<bool, ProviderError>;

    /// Fetch an event, `None` if it does not exist.
    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, ProviderError>;
}

/// Read-only access to routines owned elsewhere.
pub trait RoutineProvider: Send + Sync {
    fn get_routine(&self, user_id: &str, routine_id: &str) -> Result<Option<Routine>>;

    fn routines_for_user(&self, user_id: &str) -> Result<Vec<Routine>>;

    fn active_routines(&self, user_id: &str) -> Result<Vec<Routine>> {
        Ok(self
            .routines_for_user(user_id)?
            .into_iter()
            .filter(|r| r.is_active)
            .collect())
    }
}

/// Completion records, written through on every toggle.
pub trait WorkoutLogStore: Send + Sync {
    fn upsert_log(&self, log: &WorkoutLog) -> Result<()>;

    fn get_log(&self, key: &WorkoutKey) -> Result<Option<WorkoutLog>>;
}

/// Persistence for occurrence-to-event mappings.
pub trait MappingStore: Send + Sync {
    /// All mappings of a routine, ordered by date.
    fn mappings_for_routine(&self, user_id: &str, routine_id: &str) -> Result<Vec<EventMapping>>;

    fn find_mapping(
        &self,
        user_id: &str,
        routine_id: &str,
        workout_id: &str,
        event_date: NaiveDate,
    ) -> Result<Option<EventMapping>>;

    /// Fails with `DatabaseError::Conflict` if the key already exists.
    fn insert_mapping(&self, mapping: &EventMapping) -> Result<()>;

    /// Returns whether a row was removed.
    fn delete_mapping(&self, mapping_id: &str) -> Result<bool>;

    fn count_for_routine(&self, user_id: &str, routine_id: &str) -> Result<usize> {
        Ok(self.mappings_for_routine(user_id, routine_id)?.len())
    }
}
