//! In-process calendar provider.
//!
//! Stores events in a map, counts calls per operation and can be told to
//! fail. Used by tests and by the CLI's offline mode.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::traits::CalendarProvider;
use crate::error::ProviderError;
use crate::sync::types::{CalendarEvent, EventPatch};

/// Provider operation, used for counters and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Get,
}

#[derive(Default)]
struct State {
    next_id: u64,
    events: BTreeMap<String, CalendarEvent>,
    calls: HashMap<Operation, usize>,
    scripted_failures: HashMap<Operation, VecDeque<ProviderError>>,
    failing_summaries: Vec<(String, ProviderError)>,
}

/// Thread-safe fake calendar.
#[derive(Default)]
pub struct InMemoryCalendar {
    state: Mutex<State>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::Other("in-memory calendar lock poisoned".into()))
    }

    /// Fail the next `times` calls of `op` with `error`.
    pub fn fail_next(&self, op: Operation, times: usize, error: ProviderError) {
        if let Ok(mut state) = self.lock() {
            let queue = state.scripted_failures.entry(op).or_default();
            queue.extend(std::iter::repeat(error).take(times));
        }
    }

    /// Fail every create whose summary contains `needle`.
    pub fn fail_creates_matching(&self, needle: impl Into<String>, error: ProviderError) {
        if let Ok(mut state) = self.lock() {
            state.failing_summaries.push((needle.into(), error));
        }
    }

    /// Drop all injected failures.
    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.lock() {
            state.scripted_failures.clear();
            state.failing_summaries.clear();
        }
    }

    /// Number of calls made for `op`, including failed ones.
    pub fn calls(&self, op: Operation) -> usize {
        self.lock()
            .map(|s| s.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().map(|s| s.calls.values().sum()).unwrap_or(0)
    }

    /// Snapshot of stored events keyed by id.
    pub fn events(&self) -> BTreeMap<String, CalendarEvent> {
        self.lock().map(|s| s.events.clone()).unwrap_or_default()
    }

    pub fn event(&self, event_id: &str) -> Option<CalendarEvent> {
        self.lock().ok().and_then(|s| s.events.get(event_id).cloned())
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.event(event_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an event directly, bypassing counters and failures.
    pub fn seed(&self, event: CalendarEvent) -> String {
        match self.lock() {
            Ok(mut state) => {
                let id = state.allocate_id();
                state.events.insert(id.clone(), event);
                id
            }
            Err(_) => String::new(),
        }
    }

    /// Remove an event behind the engine's back, as another client would.
    pub fn remove_externally(&self, event_id: &str) -> bool {
        self.lock()
            .map(|mut s| s.events.remove(event_id).is_some())
            .unwrap_or(false)
    }
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("evt_{}", self.next_id)
    }

    /// Count the call and pop any scripted failure for it.
    fn begin(&mut self, op: Operation) -> Result<(), ProviderError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.scripted_failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarProvider for InMemoryCalendar {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, ProviderError> {
        let mut state = self.lock()?;
        state.begin(Operation::Create)?;
        if let Some((_, err)) = state
            .failing_summaries
            .iter()
            .find(|(needle, _)| event.summary.contains(needle.as_str()))
        {
            return Err(err.clone());
        }
        let id = state.allocate_id();
        state.events.insert(id.clone(), event.clone());
        Ok(id)
    }

    async fn update_event(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent, ProviderError> {
        let mut state = self.lock()?;
        state.begin(Operation::Update)?;
        let event = state
            .events
            .get_mut(event_id)
            .ok_or_else(|| ProviderError::NotFound(event_id.to_string()))?;
        patch.apply_to(event);
        Ok(event.clone())
    }

    async fn delete_event(&self, event_id: &str) -> Result<bool, ProviderError> {
        let mut state = self.lock()?;
        state.begin(Operation::Delete)?;
        Ok(state.events.remove(event_id).is_some())
    }

    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>, ProviderError> {
        let mut state = self.lock()?;
        state.begin(Operation::Get)?;
        Ok(state.events.get(event_id).cloned())
    }
}
