//! # Routinecal Core Library
//!
//! This library projects workout routines onto an external calendar and
//! keeps the two consistent as routines are synced, re-synced, deactivated,
//! or have individual workouts marked complete. The `routinecal` CLI is a
//! thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Scheduler**: deterministic `(workout, date)` occurrences from routine
//!   settings and a start date
//! - **Sync**: event transformation, teardown-then-recreate reconciliation,
//!   completion marking, retry with backoff
//! - **Storage**: SQLite event mappings and workout logs, TOML configuration,
//!   JSON routine catalog
//! - **Integrations**: calendar provider trait with Google Calendar and
//!   in-memory implementations
//!
//! ## Key Components
//!
//! - [`SyncOrchestrator`]: routine-level and user-level reconciliation
//! - [`CompletionStatusSync`]: completion toggles mirrored onto events
//! - [`CalendarProvider`]: the calendar seam
//! - [`Database`]: mapping and workout-log persistence
//! - [`Config`]: application configuration management

pub mod error;
pub mod integrations;
pub mod logging;
pub mod routine;
pub mod scheduler;
pub mod storage;
pub mod sync;

pub use error::{ConfigError, CoreError, DatabaseError, ProviderError, ValidationError};
pub use integrations::{
    CalendarProvider, GoogleCalendarProvider, InMemoryCalendar, MappingStore, RoutineProvider,
    WorkoutLogStore,
};
pub use routine::{Exercise, Occurrence, Routine, RoutineSettings, SplitType, Workout, WorkoutKey, WorkoutLog};
pub use scheduler::{compute_occurrences, ScheduleOptions};
pub use storage::{Config, Database, RoutineCatalog};
pub use sync::{
    CalendarEvent, CompletionStatusSync, CompletionStyle, EventMapping, EventPatch, RetryPolicy,
    SyncOrchestrator, SyncResult, SyncSummary, ToggleResult,
};
