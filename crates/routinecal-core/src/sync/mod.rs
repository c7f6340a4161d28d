//! Routine-to-calendar synchronization layer.
//!
//! Projects workout schedules onto an external calendar and keeps completion
//! status in step. The orchestrator owns reconciliation; the completion
//! synchronizer owns the per-event completed/incomplete state.

pub mod completion;
pub mod event_transform;
pub mod orchestrator;
pub mod retry;
pub mod types;

#[cfg(test)]
mod completion_tests;

pub use completion::{CompletionStatusSync, CompletionStyle};
pub use event_transform::{workout_to_event, EventDefaults, EventOptions};
pub use orchestrator::{PreviewItem, SyncOrchestrator};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use types::{
    CalendarEvent, EventDateTime, EventMapping, EventPatch, SyncErrorKind, SyncItemError,
    SyncResult, SyncSummary, ToggleResult,
};
