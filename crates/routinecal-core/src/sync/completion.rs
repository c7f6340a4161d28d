//! Completion status synchronization.
//!
//! A workout is either incomplete or completed. Completing prepends a marker
//! to the mapped event's summary and sets the completion color; undoing it
//! strips the marker and resets the color. Both directions are idempotent and
//! a full cycle restores the summary byte for byte.
//!
//! The workout log is always written first. Calendar sync is best effort.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::retry::{retry_with_backoff, RetryPolicy};
use super::types::{CalendarEvent, EventPatch, ToggleResult};
use crate::error::{ProviderError, Result};
use crate::integrations::traits::{CalendarProvider, MappingStore, WorkoutLogStore};
use crate::routine::{WorkoutKey, WorkoutLog};

/// Summary prefix and color that flag a completed workout.
///
/// The marker is recognized by prefix alone. A summary that already starts
/// with the marker counts as marked: completing leaves it unchanged and
/// un-completing strips that prefix, so such titles do not round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStyle {
    pub marker: String,
    pub color_id: String,
}

impl Default for CompletionStyle {
    fn default() -> Self {
        Self {
            marker: "✅ ".to_string(),
            color_id: "10".to_string(),
        }
    }
}

impl CompletionStyle {
    pub fn is_marked(&self, summary: &str) -> bool {
        summary.starts_with(&self.marker)
    }

    /// Prefix the marker unless it is already there.
    pub fn apply_marker(&self, summary: &str) -> String {
        if self.is_marked(summary) {
            summary.to_string()
        } else {
            format!("{}{}", self.marker, summary)
        }
    }

    /// Remove one leading marker, if present.
    pub fn strip_marker(&self, summary: &str) -> String {
        summary
            .strip_prefix(self.marker.as_str())
            .unwrap_or(summary)
            .to_string()
    }

    /// The event already looks completed.
    pub fn is_completed(&self, event: &CalendarEvent) -> bool {
        self.is_marked(&event.summary) && event.color_id.as_deref() == Some(self.color_id.as_str())
    }
}

/// Keeps calendar events in step with workout completion.
pub struct CompletionStatusSync {
    calendar: Arc<dyn CalendarProvider>,
    mappings: Arc<dyn MappingStore>,
    logs: Arc<dyn WorkoutLogStore>,
    style: CompletionStyle,
    retry: RetryPolicy,
}

impl CompletionStatusSync {
    pub fn new(
        calendar: Arc<dyn CalendarProvider>,
        mappings: Arc<dyn MappingStore>,
        logs: Arc<dyn WorkoutLogStore>,
    ) -> Self {
        Self {
            calendar,
            mappings,
            logs,
            style: CompletionStyle::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_style(mut self, style: CompletionStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn style(&self) -> &CompletionStyle {
        &self.style
    }

    async fn fetch(&self, event_id: &str) -> Result<CalendarEvent, ProviderError> {
        retry_with_backoff(&self.retry, "get_event", ProviderError::is_retryable, || {
            self.calendar.get_event(event_id)
        })
        .await?
        .ok_or_else(|| ProviderError::NotFound(event_id.to_string()))
    }

    async fn patch(&self, event_id: &str, patch: &EventPatch) -> Result<CalendarEvent, ProviderError> {
        retry_with_backoff(&self.retry, "update_event", ProviderError::is_retryable, || {
            self.calendar.update_event(event_id, patch)
        })
        .await
    }

    /// Mark the event completed. Calling it again changes nothing.
    pub async fn mark_completed(&self, event_id: &str) -> Result<CalendarEvent, ProviderError> {
        let event = self.fetch(event_id).await?;
        if self.style.is_completed(&event) {
            debug!(event_id, "event already marked completed");
            return Ok(event);
        }

        let patch = EventPatch {
            summary: (!self.style.is_marked(&event.summary))
                .then(|| self.style.apply_marker(&event.summary)),
            color_id: Some(Some(self.style.color_id.clone())),
        };
        self.patch(event_id, &patch).await
    }

    /// Mark the event incomplete. Calling it again changes nothing.
    pub async fn mark_incomplete(&self, event_id: &str) -> Result<CalendarEvent, ProviderError> {
        let event = self.fetch(event_id).await?;
        let marked = self.style.is_marked(&event.summary);
        if !marked && event.color_id.is_none() {
            debug!(event_id, "event already incomplete");
            return Ok(event);
        }

        let patch = EventPatch {
            summary: marked.then(|| self.style.strip_marker(&event.summary)),
            color_id: event.color_id.is_some().then_some(None),
        };
        self.patch(event_id, &patch).await
    }

    /// Record a completion change and mirror it onto the mapped event.
    ///
    /// `completed_exercise_ids` replaces the stored list when given; `None`
    /// keeps whatever the log already holds.
    ///
    /// # Errors
    /// Only a failed workout-log write is an error. Calendar problems are
    /// reported through [`ToggleResult::error`].
    pub async fn toggle_workout_completion(
        &self,
        key: &WorkoutKey,
        is_completed: bool,
        completed_exercise_ids: Option<Vec<String>>,
    ) -> Result<ToggleResult> {
        let previous = self.logs.get_log(key)?;
        let completed_exercise_ids = completed_exercise_ids
            .or_else(|| previous.map(|log| log.completed_exercise_ids))
            .unwrap_or_default();

        let log = WorkoutLog {
            user_id: key.user_id.clone(),
            routine_id: key.routine_id.clone(),
            workout_id: key.workout_id.clone(),
            date: key.date,
            is_completed,
            completed_exercise_ids,
            updated_at: Utc::now(),
        };
        self.logs.upsert_log(&log)?;

        let mapping = match self
            .mappings
            .find_mapping(&key.user_id, &key.routine_id, &key.workout_id, key.date)
        {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(
                    routine_id = %key.routine_id,
                    workout_id = %key.workout_id,
                    date = %key.date,
                    error = %e,
                    "mapping lookup failed, calendar not updated"
                );
                return Ok(ToggleResult {
                    log,
                    calendar_synced: false,
                    event_id: None,
                    error: Some(e.to_string()),
                });
            }
        };

        let Some(mapping) = mapping else {
            debug!(
                routine_id = %key.routine_id,
                workout_id = %key.workout_id,
                date = %key.date,
                "no calendar event mapped"
            );
            return Ok(ToggleResult {
                log,
                calendar_synced: false,
                event_id: None,
                error: None,
            });
        };

        let event_id = mapping.external_event_id;
        let outcome = if is_completed {
            self.mark_completed(&event_id).await
        } else {
            self.mark_incomplete(&event_id).await
        };

        match outcome {
            Ok(_) => {
                info!(event_id = %event_id, is_completed, "calendar event updated");
                Ok(ToggleResult {
                    log,
                    calendar_synced: true,
                    event_id: Some(event_id),
                    error: None,
                })
            }
            Err(e) => {
                warn!(event_id = %event_id, error = %e, "calendar event not updated");
                Ok(ToggleResult {
                    log,
                    calendar_synced: false,
                    event_id: Some(event_id),
                    error: Some(e.to_string()),
                })
            }
        }
    }
}
