//! Schedule computation for workout routines.
//!
//! Projects a routine's settings onto concrete calendar dates:
//! - Walks `duration_weeks * 7` consecutive days from the start date
//! - Skips weekend days
//! - Assigns at most `workouts_per_week` workouts per week, cycling through
//!   the routine's workouts in order
//!
//! The result is fully deterministic for identical inputs, which is what
//! makes teardown-then-recreate reconciliation converge on the same state.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::routine::{Occurrence, RoutineSettings, Workout};

/// Options controlling the weekly walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    /// The weekday on which the per-week counter resets.
    pub week_start: Weekday,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            week_start: Weekday::Mon,
        }
    }
}

/// Saturday and Sunday never receive a workout.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Compute the ordered occurrence list for a routine.
///
/// Returns an empty list when the routine has no workouts. A
/// `workouts_per_week` larger than five is capped implicitly because only
/// five weekday slots exist per week.
pub fn compute_occurrences(
    settings: &RoutineSettings,
    workouts: &[Workout],
    start_date: NaiveDate,
    options: &ScheduleOptions,
) -> Vec<Occurrence> {
    if workouts.is_empty() || settings.workouts_per_week == 0 {
        return Vec::new();
    }

    let total_days = u64::from(settings.duration_weeks) * 7;
    let mut occurrences = Vec::new();
    let mut workout_index = 0usize;
    let mut this_week = 0u32;

    for offset in 0..total_days {
        let Some(date) = start_date.checked_add_days(Days::new(offset)) else {
            break;
        };

        if offset > 0 && date.weekday() == options.week_start {
            this_week = 0;
        }

        if is_weekend(date) || this_week >= settings.workouts_per_week {
            continue;
        }

        let slot = workout_index % workouts.len();
        occurrences.push(Occurrence {
            workout_id: workouts[slot].id.clone(),
            workout_index: slot,
            date,
        });
        workout_index += 1;
        this_week += 1;
    }

    occurrences
}
