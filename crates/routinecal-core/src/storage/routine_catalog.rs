//! Read-only routine source backed by a JSON file or an in-memory list.

use std::path::Path;
use std::sync::RwLock;

use crate::error::{CoreError, Result};
use crate::integrations::traits::RoutineProvider;
use crate::routine::Routine;

/// Routines supplied by the routine-management side.
#[derive(Debug, Default)]
pub struct RoutineCatalog {
    routines: RwLock<Vec<Routine>>,
}

impl RoutineCatalog {
    pub fn new(routines: Vec<Routine>) -> Self {
        Self {
            routines: RwLock::new(routines),
        }
    }

    /// Load a JSON array of routines. A missing file yields an empty catalog.
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let routines: Vec<Routine> = serde_json::from_str(&content)?;
                Ok(Self::new(routines))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace (or add) a routine, as the owning side would after an edit.
    pub fn upsert(&self, routine: Routine) -> Result<()> {
        let mut routines = self
            .routines
            .write()
            .map_err(|_| CoreError::Custom("routine catalog lock poisoned".into()))?;
        match routines
            .iter_mut()
            .find(|r| r.id == routine.id && r.user_id == routine.user_id)
        {
            Some(existing) => *existing = routine,
            None => routines.push(routine),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routines.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RoutineProvider for RoutineCatalog {
    fn get_routine(&self, user_id: &str, routine_id: &str) -> Result<Option<Routine>> {
        let routines = self
            .routines
            .read()
            .map_err(|_| CoreError::Custom("routine catalog lock poisoned".into()))?;
        Ok(routines
            .iter()
            .find(|r| r.id == routine_id && r.user_id == user_id)
            .cloned())
    }

    fn routines_for_user(&self, user_id: &str) -> Result<Vec<Routine>> {
        let routines = self
            .routines
            .read()
            .map_err(|_| CoreError::Custom("routine catalog lock poisoned".into()))?;
        Ok(routines
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
