//! Core types for calendar synchronization.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ProviderError, ValidationError};
use crate::routine::WorkoutLog;

/// Start or end of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// RFC 3339 timestamp carrying the zone's UTC offset.
    pub date_time: DateTime<FixedOffset>,
    /// IANA zone name, e.g. "Europe/Berlin".
    #[serde(default)]
    pub time_zone: String,
}

/// A calendar event payload, shaped like the Google Calendar resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Empty for untitled events, which the provider sends without a summary.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<String>,
}

impl CalendarEvent {
    /// Check the structural contract every emitted event must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.summary.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "summary".into(),
            });
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "description".into(),
            });
        }
        if self.start.time_zone.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "start.timeZone".into(),
            });
        }
        if self.end.time_zone.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "end.timeZone".into(),
            });
        }
        if self.start.date_time >= self.end.date_time {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start.date_time.to_rfc3339(),
                end: self.end.date_time.to_rfc3339(),
            });
        }
        Ok(())
    }

    /// Event length in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end.date_time - self.start.date_time).num_minutes()
    }
}

/// Partial update applied to an existing event.
///
/// `None` leaves a field untouched; `color_id: Some(None)` resets the color
/// to the calendar default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub summary: Option<String>,
    pub color_id: Option<Option<String>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.color_id.is_none()
    }

    /// Apply this patch to an event in place.
    pub fn apply_to(&self, event: &mut CalendarEvent) {
        if let Some(summary) = &self.summary {
            event.summary = summary.clone();
        }
        if let Some(color_id) = &self.color_id {
            event.color_id = color_id.clone();
        }
    }
}

/// Persisted correlation between a scheduled workout and its calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMapping {
    pub id: String,
    pub user_id: String,
    pub routine_id: String,
    pub workout_id: String,
    pub event_date: NaiveDate,
    pub external_event_id: String,
    pub created_at: DateTime<Utc>,
}

/// Category of a per-item sync failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Malformed workout or event data
    Validation,
    /// Transient provider failure that exhausted the retry budget
    Retryable,
    /// Non-retryable provider failure (auth, malformed request)
    Fatal,
    /// Local mapping store failure
    Storage,
}

impl From<&CoreError> for SyncErrorKind {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::Validation(_) => SyncErrorKind::Validation,
            CoreError::Provider(p) => SyncErrorKind::from(p),
            _ => SyncErrorKind::Storage,
        }
    }
}

impl From<&ProviderError> for SyncErrorKind {
    fn from(err: &ProviderError) -> Self {
        if err.is_retryable() {
            SyncErrorKind::Retryable
        } else {
            SyncErrorKind::Fatal
        }
    }
}

/// One failed item inside a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItemError {
    pub routine_id: String,
    pub workout_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncItemError {
    pub fn new(routine_id: impl Into<String>, kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            routine_id: routine_id.into(),
            workout_id: None,
            date: None,
            kind,
            message: message.into(),
        }
    }

    pub fn for_occurrence(
        routine_id: impl Into<String>,
        workout_id: impl Into<String>,
        date: NaiveDate,
        err: &CoreError,
    ) -> Self {
        Self {
            routine_id: routine_id.into(),
            workout_id: Some(workout_id.into()),
            date: Some(date),
            kind: SyncErrorKind::from(err),
            message: err.to_string(),
        }
    }
}

/// Outcome of reconciling one routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub routine_id: String,
    pub success: bool,
    pub created_count: usize,
    pub deleted_count: usize,
    pub errors: Vec<SyncItemError>,
    /// The run stopped early at an occurrence boundary.
    #[serde(default)]
    pub cancelled: bool,
}

impl SyncResult {
    pub fn new(
        routine_id: impl Into<String>,
        created_count: usize,
        deleted_count: usize,
        errors: Vec<SyncItemError>,
    ) -> Self {
        Self {
            routine_id: routine_id.into(),
            success: errors.is_empty(),
            created_count,
            deleted_count,
            errors,
            cancelled: false,
        }
    }

    /// Some but not all occurrences failed.
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty() && self.created_count > 0
    }
}

/// Aggregate outcome of syncing every active routine of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub success: bool,
    pub created_count: usize,
    pub deleted_count: usize,
    pub errors: Vec<SyncItemError>,
    pub routines: Vec<SyncResult>,
}

impl SyncSummary {
    /// Fold per-routine results (and routine-level failures) into totals.
    pub fn from_results(routines: Vec<SyncResult>, mut routine_failures: Vec<SyncItemError>) -> Self {
        let created_count = routines.iter().map(|r| r.created_count).sum();
        let deleted_count = routines.iter().map(|r| r.deleted_count).sum();
        let mut errors: Vec<SyncItemError> =
            routines.iter().flat_map(|r| r.errors.iter().cloned()).collect();
        errors.append(&mut routine_failures);

        Self {
            success: errors.is_empty(),
            created_count,
            deleted_count,
            errors,
            routines,
        }
    }
}

/// Outcome of a completion toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResult {
    /// The log row as written.
    pub log: WorkoutLog,
    /// The mapped calendar event was updated to match.
    pub calendar_synced: bool,
    pub event_id: Option<String>,
    pub error: Option<String>,
}
