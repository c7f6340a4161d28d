//! Routine data model.
//!
//! Routines, workouts and exercises are owned by the routine-management side
//! of the application; this crate only reads them. Workout logs are owned by
//! the workout-log store and written through on every completion toggle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How a routine splits muscle groups across its workouts.
///
/// Informational only: scheduling does not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    #[default]
    FullBody,
    UpperLower,
    PushPullLegs,
    BodyPart,
    Custom,
}

/// Scheduling parameters of a routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineSettings {
    pub duration_weeks: u32,
    pub workouts_per_week: u32,
    #[serde(default)]
    pub split_type: SplitType,
}

/// One exercise inside a workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub sets: u32,
    /// Free-form, e.g. "8-10" or "30s".
    pub reps: String,
    pub muscle_group: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single training day of a routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub day_number: u32,
    pub name: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

/// A user's workout routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub is_active: bool,
    pub settings: RoutineSettings,
    #[serde(default)]
    pub workouts: Vec<Workout>,
}

impl Routine {
    /// Find a workout by id.
    pub fn workout(&self, workout_id: &str) -> Option<&Workout> {
        self.workouts.iter().find(|w| w.id == workout_id)
    }
}

/// One computed `(workout, date)` assignment for a routine.
///
/// Never persisted by itself; the event mapping table is what survives a
/// sync run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub workout_id: String,
    /// Position of the workout in `Routine::workouts`.
    pub workout_index: usize,
    pub date: NaiveDate,
}

/// Key identifying one scheduled workout instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkoutKey {
    pub user_id: String,
    pub routine_id: String,
    pub workout_id: String,
    pub date: NaiveDate,
}

impl WorkoutKey {
    pub fn new(
        user_id: impl Into<String>,
        routine_id: impl Into<String>,
        workout_id: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            routine_id: routine_id.into(),
            workout_id: workout_id.into(),
            date,
        }
    }
}

/// Completion record for one scheduled workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutLog {
    pub user_id: String,
    pub routine_id: String,
    pub workout_id: String,
    pub date: NaiveDate,
    pub is_completed: bool,
    #[serde(default)]
    pub completed_exercise_ids: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl WorkoutLog {
    pub fn key(&self) -> WorkoutKey {
        WorkoutKey::new(
            self.user_id.clone(),
            self.routine_id.clone(),
            self.workout_id.clone(),
            self.date,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routine_deserializes_with_defaults() {
        let json = r#"{
            "id": "r1",
            "user_id": "u1",
            "name": "Strength Block",
            "is_active": true,
            "settings": {"duration_weeks": 4, "workouts_per_week": 3},
            "workouts": [
                {"id": "w1", "day_number": 1, "name": "Push", "exercises": [
                    {"id": "e1", "name": "Bench Press", "sets": 3, "reps": "8-10", "muscle_group": "chest"}
                ]}
            ]
        }"#;

        let routine: Routine = serde_json::from_str(json).unwrap();
        assert_eq!(routine.settings.split_type, SplitType::FullBody);
        assert_eq!(routine.workouts[0].exercises[0].description, None);
        assert!(routine.workout("w1").is_some());
        assert!(routine.workout("missing").is_none());
    }

    #[test]
    fn split_type_uses_snake_case() {
        let json = serde_json::to_string(&SplitType::PushPullLegs).unwrap();
        assert_eq!(json, "\"push_pull_legs\"");
    }
}
