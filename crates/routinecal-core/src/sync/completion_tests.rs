//! Tests for completion module.

#[cfg(test)]
mod tests {
    use super::super::completion::*;
    use crate::integrations::memory::{InMemoryCalendar, Operation};
    use crate::integrations::traits::{MappingStore, WorkoutLogStore};
    use crate::error::ProviderError;
    use crate::routine::WorkoutKey;
    use crate::storage::Database;
    use crate::sync::retry::RetryPolicy;
    use crate::sync::types::{CalendarEvent, EventDateTime, EventMapping};
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn event(summary: &str) -> CalendarEvent {
        let tz = FixedOffset::east_opt(0).unwrap();
        let start = tz.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        CalendarEvent {
            summary: summary.into(),
            description: "1. Squat: 5 sets x 5 reps".into(),
            start: EventDateTime {
                date_time: start,
                time_zone: "UTC".into(),
            },
            end: EventDateTime {
                date_time: start + chrono::Duration::minutes(35),
                time_zone: "UTC".into(),
            },
            color_id: None,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn key() -> WorkoutKey {
        WorkoutKey::new("u1", "r1", "w0", date())
    }

    struct Fixture {
        calendar: Arc<InMemoryCalendar>,
        db: Arc<Database>,
        sync: CompletionStatusSync,
    }

    fn fixture() -> Fixture {
        let calendar = Arc::new(InMemoryCalendar::new());
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sync = CompletionStatusSync::new(calendar.clone(), db.clone(), db.clone())
            .with_retry_policy(RetryPolicy::no_retry());
        Fixture { calendar, db, sync }
    }

    fn map_event(db: &Database, event_id: &str) {
        db.insert_mapping(&EventMapping {
            id: "m1".into(),
            user_id: "u1".into(),
            routine_id: "r1".into(),
            workout_id: "w0".into(),
            event_date: date(),
            external_event_id: event_id.into(),
            created_at: Utc::now(),
        })
        .unwrap();
    }

    #[test]
    fn test_marker_helpers() {
        let style = CompletionStyle::default();
        assert!(!style.is_marked("Push - Block"));
        assert_eq!(style.apply_marker("Push - Block"), "✅ Push - Block");
        assert_eq!(style.apply_marker("✅ Push - Block"), "✅ Push - Block");
        assert_eq!(style.strip_marker("✅ Push - Block"), "Push - Block");
        assert_eq!(style.strip_marker("Push - Block"), "Push - Block");
    }

    #[tokio::test]
    async fn test_mark_completed_is_idempotent() {
        let f = fixture();
        let id = f.calendar.seed(event("Push - Block"));

        f.sync.mark_completed(&id).await.unwrap();
        f.sync.mark_completed(&id).await.unwrap();

        let stored = f.calendar.event(&id).unwrap();
        assert_eq!(stored.summary, "✅ Push - Block");
        assert_eq!(stored.summary.matches("✅").count(), 1);
        assert_eq!(stored.color_id.as_deref(), Some("10"));
        // second call saw the completed state and skipped the update
        assert_eq!(f.calendar.calls(Operation::Update), 1);
    }

    #[tokio::test]
    async fn test_mark_incomplete_restores_summary() {
        let f = fixture();
        let id = f.calendar.seed(event("Legs - Block"));

        f.sync.mark_completed(&id).await.unwrap();
        f.sync.mark_incomplete(&id).await.unwrap();
        f.sync.mark_incomplete(&id).await.unwrap();

        let stored = f.calendar.event(&id).unwrap();
        assert_eq!(stored.summary, "Legs - Block");
        assert_eq!(stored.color_id, None);
    }

    #[tokio::test]
    async fn test_title_already_starting_with_marker_loses_it() {
        let f = fixture();
        let id = f.calendar.seed(event("✅ Legs - Block"));

        let completed = f.sync.mark_completed(&id).await.unwrap();
        assert_eq!(completed.summary, "✅ Legs - Block");
        assert_eq!(completed.color_id.as_deref(), Some("10"));

        let restored = f.sync.mark_incomplete(&id).await.unwrap();
        assert_eq!(restored.summary, "Legs - Block");
    }

    #[tokio::test]
    async fn test_missing_event_is_failure() {
        let f = fixture();
        let err = f.sync.mark_completed("evt_404").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(f.sync.mark_incomplete("evt_404").await.is_err());
    }

    #[tokio::test]
    async fn test_toggle_without_mapping_makes_no_provider_call() {
        let f = fixture();
        let result = f
            .sync
            .toggle_workout_completion(&key(), true, Some(vec!["e1".into()]))
            .await
            .unwrap();

        assert!(!result.calendar_synced);
        assert!(result.error.is_none());
        assert!(result.event_id.is_none());
        assert_eq!(f.calendar.total_calls(), 0);

        let log = f.db.get_log(&key()).unwrap().unwrap();
        assert!(log.is_completed);
        assert_eq!(log.completed_exercise_ids, vec!["e1"]);
    }

    #[tokio::test]
    async fn test_toggle_with_mapping_updates_event() {
        let f = fixture();
        let id = f.calendar.seed(event("Pull - Block"));
        map_event(&f.db, &id);

        let done = f
            .sync
            .toggle_workout_completion(&key(), true, Some(vec!["e1".into(), "e2".into()]))
            .await
            .unwrap();
        assert!(done.calendar_synced);
        assert_eq!(done.event_id.as_deref(), Some(id.as_str()));
        assert_eq!(f.calendar.event(&id).unwrap().summary, "✅ Pull - Block");

        let undone = f
            .sync
            .toggle_workout_completion(&key(), false, None)
            .await
            .unwrap();
        assert!(undone.calendar_synced);
        assert_eq!(f.calendar.event(&id).unwrap().summary, "Pull - Block");
        // un-completing keeps the recorded exercise list
        assert_eq!(undone.log.completed_exercise_ids, vec!["e1", "e2"]);
        assert!(!f.db.get_log(&key()).unwrap().unwrap().is_completed);
    }

    #[tokio::test]
    async fn test_toggle_with_vanished_event_still_writes_log() {
        let f = fixture();
        let id = f.calendar.seed(event("Pull - Block"));
        map_event(&f.db, &id);
        f.calendar.remove_externally(&id);

        let result = f
            .sync
            .toggle_workout_completion(&key(), true, None)
            .await
            .unwrap();
        assert!(!result.calendar_synced);
        assert!(result.error.is_some());
        assert!(f.db.get_log(&key()).unwrap().unwrap().is_completed);
    }

    #[tokio::test]
    async fn test_transient_update_failure_is_retried() {
        let calendar = Arc::new(InMemoryCalendar::new());
        let db = Arc::new(Database::open_in_memory().unwrap());
        let sync = CompletionStatusSync::new(calendar.clone(), db.clone(), db.clone())
            .with_retry_policy(
                RetryPolicy::new(3, std::time::Duration::from_millis(1), std::time::Duration::from_millis(2))
                    .with_jitter(false),
            );
        let id = calendar.seed(event("Core - Block"));
        calendar.fail_next(Operation::Update, 2, ProviderError::RateLimited);

        sync.mark_completed(&id).await.unwrap();
        assert_eq!(calendar.calls(Operation::Update), 3);
        assert_eq!(calendar.event(&id).unwrap().summary, "✅ Core - Block");
    }

    proptest! {
        #[test]
        fn prop_marker_round_trip(summary in "[^✅]{1,40}", cycles in 1usize..5) {
            let style = CompletionStyle::default();
            let mut current = summary.clone();
            for _ in 0..cycles {
                current = style.apply_marker(&current);
                current = style.apply_marker(&current);
                prop_assert_eq!(current.matches(style.marker.as_str()).count(), 1);
                current = style.strip_marker(&current);
                current = style.strip_marker(&current);
                prop_assert_eq!(&current, &summary);
            }
        }

        #[test]
        fn prop_provider_round_trip(summary in "[A-Za-z][A-Za-z0-9 \\-]{0,30}", cycles in 1usize..4) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let f = fixture();
                let id = f.calendar.seed(event(&summary));
                for _ in 0..cycles {
                    f.sync.mark_completed(&id).await.unwrap();
                    let completed = f.calendar.event(&id).unwrap();
                    assert_eq!(completed.summary.matches("✅ ").count(), 1);
                    f.sync.mark_incomplete(&id).await.unwrap();
                }
                let restored = f.calendar.event(&id).unwrap();
                assert_eq!(restored.summary.as_bytes(), summary.as_bytes());
                assert_eq!(restored.color_id, None);
            });
        }
    }
}
