//! Workout to calendar-event transformation.
//!
//! Pure functions only; nothing here talks to a calendar provider.

use chrono::{Duration, LocalResult, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::routine::Workout;
use crate::sync::types::{CalendarEvent, EventDateTime};

/// Minimum event length in minutes.
pub const MIN_DURATION_MINUTES: u32 = 30;
/// Minutes budgeted per exercise.
pub const MINUTES_PER_EXERCISE: u32 = 5;
/// Fixed warm-up/cool-down allowance in minutes.
pub const BASE_MINUTES: u32 = 10;

/// Fallbacks used when a transform call omits start time or zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefaults {
    pub start_time: NaiveTime,
    pub time_zone: String,
}

impl Default for EventDefaults {
    fn default() -> Self {
        Self {
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            time_zone: "UTC".to_string(),
        }
    }
}

/// Per-occurrence transform options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOptions {
    pub routine_name: String,
    pub event_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub time_zone: Option<String>,
}

impl EventOptions {
    pub fn new(routine_name: impl Into<String>, event_date: NaiveDate) -> Self {
        Self {
            routine_name: routine_name.into(),
            event_date,
            start_time: None,
            duration_minutes: None,
            time_zone: None,
        }
    }

    pub fn with_start_time(mut self, start_time: NaiveTime) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_time_zone(mut self, tz: impl Into<String>) -> Self {
        self.time_zone = Some(tz.into());
        self
    }
}

/// Parse an `HH:MM` start time.
pub fn parse_start_time(value: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ValidationError::InvalidStartTime(value.to_string()))
}

/// Parse an IANA zone name.
pub fn parse_time_zone(value: &str) -> Result<Tz, ValidationError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::InvalidTimeZone(value.to_string()))
}

/// Default duration: `max(30, 5 * exercises + 10)` minutes.
pub fn default_duration_minutes(exercise_count: usize) -> u32 {
    let count = u32::try_from(exercise_count).unwrap_or(u32::MAX);
    count
        .saturating_mul(MINUTES_PER_EXERCISE)
        .saturating_add(BASE_MINUTES)
        .max(MIN_DURATION_MINUTES)
}

/// Event title for a workout.
pub fn event_summary(workout_name: &str, routine_name: &str) -> String {
    format!("{} - {}", workout_name.trim(), routine_name.trim())
}

/// One enumerated line per exercise.
pub fn event_description(workout: &Workout) -> String {
    workout
        .exercises
        .iter()
        .enumerate()
        .map(|(i, ex)| {
            let mut line = format!("{}. {}: {} sets x {} reps", i + 1, ex.name, ex.sets, ex.reps);
            if !ex.muscle_group.trim().is_empty() {
                line.push_str(&format!(" ({})", ex.muscle_group));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reject workouts that cannot produce a well-formed event.
pub fn validate_workout(workout: &Workout) -> Result<(), ValidationError> {
    if workout.name.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "workout.name".into(),
        });
    }
    if workout.exercises.is_empty() {
        return Err(ValidationError::NoExercises {
            workout_id: workout.id.clone(),
        });
    }
    for ex in &workout.exercises {
        if ex.name.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: format!("exercise[{}].name", ex.id),
            });
        }
        if ex.sets == 0 {
            return Err(ValidationError::NonPositiveSets {
                exercise_id: ex.id.clone(),
            });
        }
    }
    Ok(())
}

/// Build the calendar payload for one workout occurrence.
pub fn workout_to_event(
    workout: &Workout,
    options: &EventOptions,
    defaults: &EventDefaults,
) -> Result<CalendarEvent, ValidationError> {
    validate_workout(workout)?;

    if options.routine_name.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "routine_name".into(),
        });
    }

    let zone_name = options
        .time_zone
        .as_deref()
        .unwrap_or(defaults.time_zone.as_str());
    let tz = parse_time_zone(zone_name)?;
    let start_time = options.start_time.unwrap_or(defaults.start_time);
    let naive_start = options.event_date.and_time(start_time);

    let start = match tz.from_local_datetime(&naive_start) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(ValidationError::InvalidValue {
                field: "start_time".into(),
                message: format!("{naive_start} does not exist in {tz}"),
            })
        }
    };

    let minutes = options
        .duration_minutes
        .unwrap_or_else(|| default_duration_minutes(workout.exercises.len()));
    let end = start
        .checked_add_signed(Duration::minutes(i64::from(minutes)))
        .ok_or_else(|| ValidationError::InvalidValue {
            field: "duration_minutes".into(),
            message: format!("{minutes} minutes after {naive_start} is out of range"),
        })?;

    let event = CalendarEvent {
        summary: event_summary(&workout.name, &options.routine_name),
        description: event_description(workout),
        start: EventDateTime {
            date_time: start.fixed_offset(),
            time_zone: tz.name().to_string(),
        },
        end: EventDateTime {
            date_time: end.fixed_offset(),
            time_zone: tz.name().to_string(),
        },
        color_id: None,
    };
    event.validate()?;
    Ok(event)
}
