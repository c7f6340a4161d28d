//! Integration tests for routine reconciliation.
//!
//! Drives the public orchestrator API against the in-memory calendar and an
//! in-memory SQLite store, checking the end state of calendar and mapping
//! table after each run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use routinecal_core::integrations::Operation;
use routinecal_core::sync::SyncErrorKind;
use routinecal_core::{
    CalendarProvider, Database, Exercise, InMemoryCalendar, MappingStore, ProviderError,
    RetryPolicy, Routine, RoutineCatalog, RoutineSettings, SplitType, SyncOrchestrator, Workout,
};
use tokio_util::sync::CancellationToken;

fn exercise(i: usize) -> Exercise {
    Exercise {
        id: format!("ex{i}"),
        name: format!("Exercise {i}"),
        sets: 4,
        reps: "8-10".into(),
        muscle_group: "legs".into(),
        description: None,
    }
}

fn routine(id: &str, name: &str, weeks: u32, per_week: u32, workouts: usize) -> Routine {
    Routine {
        id: id.into(),
        user_id: "user-1".into(),
        name: name.into(),
        is_active: true,
        settings: RoutineSettings {
            duration_weeks: weeks,
            workouts_per_week: per_week,
            split_type: SplitType::UpperLower,
        },
        workouts: (0..workouts)
            .map(|i| Workout {
                id: format!("{id}-w{i}"),
                day_number: i as u32 + 1,
                name: format!("Day {}", i + 1),
                exercises: (0..3).map(exercise).collect(),
            })
            .collect(),
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Harness {
    calendar: Arc<InMemoryCalendar>,
    db: Arc<Database>,
    orchestrator: SyncOrchestrator,
}

fn harness(routines: Vec<Routine>) -> Harness {
    let calendar = Arc::new(InMemoryCalendar::new());
    let db = Arc::new(Database::open_in_memory().unwrap());
    let provider: Arc<dyn CalendarProvider> = calendar.clone();
    let orchestrator = SyncOrchestrator::new(provider, db.clone(), Arc::new(RoutineCatalog::new(routines)))
        .with_retry_policy(
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1)).with_jitter(false),
        );
    Harness {
        calendar,
        db,
        orchestrator,
    }
}

/// Mapped `(workout, date)` pairs of a routine, sorted.
fn schedule_rows(db: &Database, routine_id: &str) -> Vec<(String, NaiveDate)> {
    let mut rows: Vec<_> = db
        .mappings_for_routine("user-1", routine_id)
        .unwrap()
        .into_iter()
        .map(|m| (m.workout_id, m.event_date))
        .collect();
    rows.sort();
    rows
}

#[tokio::test]
async fn test_sync_creates_one_event_per_occurrence() {
    let h = harness(vec![]);
    let r = routine("r1", "Strength", 4, 3, 3);
    let start = date(2024, 3, 4);

    let expected = h.orchestrator.occurrences(&r, start).len();
    let result = h.orchestrator.sync_routine(&r, start).await.unwrap();

    assert!(result.success);
    assert_eq!(expected, 12);
    assert_eq!(result.created_count, expected);
    assert_eq!(result.deleted_count, 0);
    assert_eq!(h.db.count_for_routine("user-1", "r1").unwrap(), expected);
    assert_eq!(h.calendar.len(), expected);
}

#[tokio::test]
async fn test_inactive_routine_gets_no_events() {
    let h = harness(vec![]);
    let mut r = routine("r1", "Strength", 2, 3, 2);
    r.is_active = false;

    let result = h.orchestrator.sync_routine(&r, date(2024, 3, 4)).await.unwrap();

    assert_eq!(result.created_count, 0);
    assert_eq!(h.db.count_for_routine("user-1", "r1").unwrap(), 0);
    assert!(h.calendar.is_empty());
    assert_eq!(h.calendar.calls(Operation::Create), 0);
}

#[tokio::test]
async fn test_deactivation_removes_everything_created() {
    let h = harness(vec![]);
    let mut r = routine("r1", "Strength", 3, 2, 2);

    let first = h.orchestrator.sync_routine(&r, date(2024, 3, 4)).await.unwrap();
    assert_eq!(first.created_count, 6);

    r.is_active = false;
    let second = h.orchestrator.sync_routine(&r, date(2024, 3, 4)).await.unwrap();

    assert_eq!(second.deleted_count, first.created_count);
    assert_eq!(second.created_count, 0);
    assert_eq!(h.db.count_for_routine("user-1", "r1").unwrap(), 0);
    assert!(h.calendar.is_empty());
}

#[tokio::test]
async fn test_resync_with_new_start_date_replaces_all_events() {
    let h = harness(vec![]);
    let r = routine("r1", "Strength", 2, 3, 3);

    let first = h.orchestrator.sync_routine(&r, date(2024, 3, 4)).await.unwrap();
    let first_ids: HashSet<String> = h
        .db
        .mappings_for_routine("user-1", "r1")
        .unwrap()
        .into_iter()
        .map(|m| m.external_event_id)
        .collect();

    let second = h.orchestrator.sync_routine(&r, date(2024, 4, 10)).await.unwrap();
    let second_mappings = h.db.mappings_for_routine("user-1", "r1").unwrap();

    assert_eq!(second.deleted_count, first.created_count);
    assert_eq!(second_mappings.len(), second.created_count);
    assert!(second_mappings
        .iter()
        .all(|m| !first_ids.contains(&m.external_event_id)));
    assert!(second_mappings.iter().all(|m| m.event_date >= date(2024, 4, 10)));
    assert!(first_ids.iter().all(|id| !h.calendar.contains(id)));
}

#[tokio::test]
async fn test_repeated_sync_converges_on_same_schedule() {
    let h = harness(vec![]);
    let r = routine("r1", "Strength", 2, 2, 2);
    let start = date(2024, 3, 4);

    h.orchestrator.sync_routine(&r, start).await.unwrap();
    let before = schedule_rows(&h.db, "r1");

    let again = h.orchestrator.sync_routine(&r, start).await.unwrap();

    assert_eq!(again.deleted_count, again.created_count);
    assert_eq!(schedule_rows(&h.db, "r1"), before);
    assert_eq!(h.calendar.len(), before.len());
}

#[test]
fn test_monday_start_schedules_consecutive_weekdays() {
    let h = harness(vec![]);
    let r = routine("r1", "Strength", 1, 2, 2);
    let monday = date(2024, 1, 1);

    let pairs: Vec<_> = h
        .orchestrator
        .occurrences(&r, monday)
        .into_iter()
        .map(|o| (o.workout_id, o.date))
        .collect();

    assert_eq!(
        pairs,
        vec![
            ("r1-w0".to_string(), monday),
            ("r1-w1".to_string(), date(2024, 1, 2)),
        ]
    );
}

#[tokio::test]
async fn test_created_events_carry_default_duration() {
    let h = harness(vec![]);
    let mut r = routine("r1", "Strength", 1, 2, 2);
    r.workouts[1].exercises = (0..5).map(exercise).collect();

    h.orchestrator.sync_routine(&r, date(2024, 1, 1)).await.unwrap();

    let mut durations: Vec<(String, i64)> = h
        .calendar
        .events()
        .into_values()
        .map(|e| (e.summary.clone(), e.duration_minutes()))
        .collect();
    durations.sort();

    assert_eq!(
        durations,
        vec![
            ("Day 1 - Strength".to_string(), 30),
            ("Day 2 - Strength".to_string(), 35),
        ]
    );
}

#[tokio::test]
async fn test_sync_all_skips_inactive_and_isolates_failures() {
    let mut paused = routine("r3", "Paused", 2, 2, 2);
    paused.is_active = false;
    let h = harness(vec![
        routine("r1", "Alpha", 2, 3, 2),
        routine("r2", "Beta", 2, 2, 2),
        paused,
    ]);

    let healthy = h.orchestrator.sync_all_routines("user-1", date(2024, 3, 4)).await.unwrap();
    assert_eq!(healthy.routines.len(), 2);
    assert_eq!(healthy.created_count, 6 + 4);
    assert_eq!(h.db.count_for_routine("user-1", "r3").unwrap(), 0);

    h.calendar.fail_creates_matching("Beta", ProviderError::Forbidden("no access".into()));
    let degraded = h.orchestrator.sync_all_routines("user-1", date(2024, 3, 4)).await.unwrap();

    let alpha = degraded.routines.iter().find(|r| r.routine_id == "r1").unwrap();
    let beta = degraded.routines.iter().find(|r| r.routine_id == "r2").unwrap();
    assert_eq!(alpha.created_count, 6);
    assert!(alpha.success);
    assert_eq!(beta.created_count, 0);
    assert_eq!(beta.errors.len(), 4);
    assert!(beta.errors.iter().all(|e| e.kind == SyncErrorKind::Fatal));
    assert_eq!(degraded.created_count, 6);
    assert!(!degraded.success);
}

#[tokio::test]
async fn test_rerun_after_cancellation_repairs_the_calendar() {
    let h = harness(vec![]);
    let r = routine("r1", "Strength", 4, 4, 2);
    let start = date(2024, 3, 4);

    let token = CancellationToken::new();
    token.cancel();
    let interrupted = h
        .orchestrator
        .sync_routine_with_cancel(&r, start, &token)
        .await
        .unwrap();
    assert!(interrupted.cancelled);

    // a partially populated calendar from some earlier crashed run
    h.orchestrator.sync_routine(&r, start).await.unwrap();
    h.calendar.remove_externally(
        &h.db.mappings_for_routine("user-1", "r1").unwrap()[0].external_event_id,
    );

    let repaired = h.orchestrator.sync_routine(&r, start).await.unwrap();
    assert!(repaired.success);
    assert_eq!(repaired.created_count, 16);
    assert_eq!(h.db.count_for_routine("user-1", "r1").unwrap(), 16);
    assert_eq!(h.calendar.len(), 16);
}

#[tokio::test]
async fn test_deactivate_through_teardown_and_resync_through_catalog() {
    let h = harness(vec![routine("r1", "Strength", 1, 3, 3)]);

    let synced = h.orchestrator.resync_routine("user-1", "r1", date(2024, 3, 4)).await.unwrap();
    assert_eq!(synced.created_count, 3);

    let removed = h.orchestrator.teardown_routine("user-1", "r1").await.unwrap();
    assert_eq!(removed.deleted_count, 3);
    assert!(h.calendar.is_empty());
    assert_eq!(h.calendar.calls(Operation::Delete), 3);
}
