//! Routine-to-calendar reconciliation.
//!
//! Every sync tears down whatever a routine previously put on the calendar
//! and then recreates one event per computed occurrence. Because the
//! schedule is deterministic, running the same sync twice converges on the
//! same final state, and a crashed run is repaired by simply running again.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::event_transform::{workout_to_event, EventDefaults, EventOptions};
use super::retry::{retry_with_backoff, RetryPolicy};
use super::types::{
    CalendarEvent, EventMapping, SyncErrorKind, SyncItemError, SyncResult, SyncSummary,
};
use crate::error::{ConfigError, CoreError, ProviderError, Result};
use crate::integrations::traits::{CalendarProvider, MappingStore, RoutineProvider};
use crate::routine::{Occurrence, Routine};
use crate::scheduler::{compute_occurrences, ScheduleOptions};
use crate::storage::Config;

/// One occurrence as it would be written to the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewItem {
    pub occurrence: Occurrence,
    pub event: Option<CalendarEvent>,
    pub error: Option<String>,
}

/// Drives teardown and recreation of calendar events for routines.
pub struct SyncOrchestrator {
    calendar: Arc<dyn CalendarProvider>,
    mappings: Arc<dyn MappingStore>,
    routines: Arc<dyn RoutineProvider>,
    retry: RetryPolicy,
    schedule: ScheduleOptions,
    event_defaults: EventDefaults,
    max_concurrent_routines: usize,
}

impl SyncOrchestrator {
    pub fn new(
        calendar: Arc<dyn CalendarProvider>,
        mappings: Arc<dyn MappingStore>,
        routines: Arc<dyn RoutineProvider>,
    ) -> Self {
        Self {
            calendar,
            mappings,
            routines,
            retry: RetryPolicy::default(),
            schedule: ScheduleOptions::default(),
            event_defaults: EventDefaults::default(),
            max_concurrent_routines: 4,
        }
    }

    /// Apply retry, schedule, event and concurrency settings from config.
    pub fn configure(mut self, config: &Config) -> std::result::Result<Self, ConfigError> {
        self.retry = config.retry_policy();
        self.schedule = config.schedule_options()?;
        self.event_defaults = config.event_defaults()?;
        self.max_concurrent_routines = config.sync.max_concurrent_routines.max(1);
        Ok(self)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_schedule_options(mut self, schedule: ScheduleOptions) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_event_defaults(mut self, defaults: EventDefaults) -> Self {
        self.event_defaults = defaults;
        self
    }

    pub fn with_max_concurrent_routines(mut self, n: usize) -> Self {
        self.max_concurrent_routines = n.max(1);
        self
    }

    /// Occurrences the routine would get for `start_date`.
    pub fn occurrences(&self, routine: &Routine, start_date: NaiveDate) -> Vec<Occurrence> {
        compute_occurrences(&routine.settings, &routine.workouts, start_date, &self.schedule)
    }

    /// Reconcile one routine's calendar events with its current schedule.
    ///
    /// # Errors
    /// Fails only when the mapping store cannot be read or written during
    /// teardown. Per-occurrence failures are collected in the result.
    pub async fn sync_routine(&self, routine: &Routine, start_date: NaiveDate) -> Result<SyncResult> {
        self.sync_routine_with_cancel(routine, start_date, &CancellationToken::new())
            .await
    }

    /// Like [`sync_routine`](Self::sync_routine), stopping between
    /// occurrences once `cancel` fires. Teardown always runs to completion.
    pub async fn sync_routine_with_cancel(
        &self,
        routine: &Routine,
        start_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<SyncResult> {
        let deleted_count = self.teardown(&routine.user_id, &routine.id).await?;

        if !routine.is_active {
            info!(routine_id = %routine.id, deleted_count, "routine inactive, torn down");
            return Ok(SyncResult::new(routine.id.clone(), 0, deleted_count, Vec::new()));
        }

        let occurrences = self.occurrences(routine, start_date);
        let mut created_count = 0;
        let mut errors = Vec::new();
        let mut cancelled = false;

        for occurrence in &occurrences {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            match self.create_occurrence(routine, occurrence).await {
                Ok(()) => created_count += 1,
                Err(err) => {
                    warn!(
                        routine_id = %routine.id,
                        workout_id = %err.workout_id.as_deref().unwrap_or_default(),
                        date = %occurrence.date,
                        kind = ?err.kind,
                        error = %err.message,
                        "occurrence not synced"
                    );
                    errors.push(err);
                }
            }
        }

        let mut result = SyncResult::new(routine.id.clone(), created_count, deleted_count, errors);
        result.cancelled = cancelled;
        info!(
            routine_id = %routine.id,
            planned = occurrences.len(),
            created_count,
            deleted_count,
            failed = result.errors.len(),
            cancelled,
            "routine synced"
        );
        Ok(result)
    }

    /// Create one event and record its mapping. Both succeed or neither stays.
    async fn create_occurrence(
        &self,
        routine: &Routine,
        occurrence: &Occurrence,
    ) -> std::result::Result<(), SyncItemError> {
        let fail = |err: CoreError| {
            SyncItemError::for_occurrence(&routine.id, &occurrence.workout_id, occurrence.date, &err)
        };

        let workout = routine
            .workouts
            .get(occurrence.workout_index)
            .ok_or_else(|| fail(CoreError::NotFound(format!("workout {}", occurrence.workout_id))))?;

        let options = EventOptions::new(routine.name.clone(), occurrence.date);
        let event = workout_to_event(workout, &options, &self.event_defaults)
            .map_err(|e| fail(e.into()))?;

        let event_id = retry_with_backoff(&self.retry, "create_event", ProviderError::is_retryable, || {
            self.calendar.create_event(&event)
        })
        .await
        .map_err(|e| fail(e.into()))?;

        let mapping = EventMapping {
            id: Uuid::new_v4().to_string(),
            user_id: routine.user_id.clone(),
            routine_id: routine.id.clone(),
            workout_id: occurrence.workout_id.clone(),
            event_date: occurrence.date,
            external_event_id: event_id.clone(),
            created_at: Utc::now(),
        };

        if let Err(store_err) = self.mappings.insert_mapping(&mapping) {
            // An event without a mapping could never be torn down.
            if let Err(e) = self.delete_event(&event_id).await {
                warn!(event_id = %event_id, error = %e, "failed to roll back unmapped event");
            }
            let mut item = fail(store_err);
            item.kind = SyncErrorKind::Storage;
            return Err(item);
        }

        debug!(
            routine_id = %routine.id,
            workout_id = %occurrence.workout_id,
            date = %occurrence.date,
            event_id = %event_id,
            "occurrence synced"
        );
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> std::result::Result<bool, ProviderError> {
        retry_with_backoff(&self.retry, "delete_event", ProviderError::is_retryable, || {
            self.calendar.delete_event(event_id)
        })
        .await
    }

    /// Delete every mapped event of a routine and drop the mappings.
    /// Returns the number of mappings removed.
    async fn teardown(&self, user_id: &str, routine_id: &str) -> Result<usize> {
        let mappings = self.mappings.mappings_for_routine(user_id, routine_id)?;
        let mut deleted = 0;

        for mapping in mappings {
            match self.delete_event(&mapping.external_event_id).await {
                Ok(true) => {}
                Ok(false) => debug!(
                    event_id = %mapping.external_event_id,
                    "event already gone"
                ),
                Err(e) if e.is_not_found() => debug!(
                    event_id = %mapping.external_event_id,
                    "event already gone"
                ),
                Err(e) => warn!(
                    routine_id,
                    event_id = %mapping.external_event_id,
                    error = %e,
                    "failed to delete calendar event during teardown"
                ),
            }
            if self.mappings.delete_mapping(&mapping.id)? {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    /// Remove all of a routine's events and mappings without recreating any.
    pub async fn teardown_routine(&self, user_id: &str, routine_id: &str) -> Result<SyncResult> {
        let deleted_count = self.teardown(user_id, routine_id).await?;
        info!(routine_id, deleted_count, "routine torn down");
        Ok(SyncResult::new(routine_id, 0, deleted_count, Vec::new()))
    }

    /// Reload a routine from the routine provider and sync it.
    ///
    /// # Errors
    /// [`CoreError::NotFound`] if the user has no such routine.
    pub async fn resync_routine(
        &self,
        user_id: &str,
        routine_id: &str,
        start_date: NaiveDate,
    ) -> Result<SyncResult> {
        let routine = self
            .routines
            .get_routine(user_id, routine_id)?
            .ok_or_else(|| CoreError::NotFound(format!("routine {routine_id} for user {user_id}")))?;
        self.sync_routine(&routine, start_date).await
    }

    /// Sync every active routine of a user.
    ///
    /// # Errors
    /// Fails only if the routine provider cannot list routines. A routine
    /// whose own sync fails contributes one error to the summary.
    pub async fn sync_all_routines(&self, user_id: &str, start_date: NaiveDate) -> Result<SyncSummary> {
        self.sync_all_routines_with_cancel(user_id, start_date, &CancellationToken::new())
            .await
    }

    pub async fn sync_all_routines_with_cancel(
        &self,
        user_id: &str,
        start_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary> {
        let routines = self.routines.active_routines(user_id)?;
        let total = routines.len();

        let mut outcomes: Vec<(usize, String, Result<SyncResult>)> = stream::iter(routines.iter().enumerate())
            .map(|(index, routine)| async move {
                let outcome = self.sync_routine_with_cancel(routine, start_date, cancel).await;
                (index, routine.id.clone(), outcome)
            })
            .buffer_unordered(self.max_concurrent_routines)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut results = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (_, routine_id, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(routine_id = %routine_id, error = %e, "routine sync failed");
                    failures.push(SyncItemError::new(routine_id, SyncErrorKind::from(&e), e.to_string()));
                }
            }
        }

        let summary = SyncSummary::from_results(results, failures);
        info!(
            user_id,
            routines = total,
            created_count = summary.created_count,
            deleted_count = summary.deleted_count,
            failed = summary.errors.len(),
            "all routines synced"
        );
        Ok(summary)
    }

    /// Schedule and transform without touching the calendar or the store.
    pub fn preview_routine(&self, routine: &Routine, start_date: NaiveDate) -> Vec<PreviewItem> {
        if !routine.is_active {
            return Vec::new();
        }
        self.occurrences(routine, start_date)
            .into_iter()
            .map(|occurrence| {
                let transformed = routine
                    .workouts
                    .get(occurrence.workout_index)
                    .ok_or_else(|| format!("workout {} missing", occurrence.workout_id))
                    .and_then(|workout| {
                        workout_to_event(
                            workout,
                            &EventOptions::new(routine.name.clone(), occurrence.date),
                            &self.event_defaults,
                        )
                        .map_err(|e| e.to_string())
                    });
                match transformed {
                    Ok(event) => PreviewItem {
                        occurrence,
                        event: Some(event),
                        error: None,
                    },
                    Err(error) => PreviewItem {
                        occurrence,
                        event: None,
                        error: Some(error),
                    },
                }
            })
            .collect()
    }
}
