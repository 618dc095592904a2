use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::backend::Backend;
use crate::errors::StageError;
use crate::workflow::stage::{StageFlag, StageState};

/// Local mirror of the backend's completion flags for one work item.
///
/// Flags only move forward locally. A `load` replaces the mirror wholesale
/// with whatever the backend reports, which is the one way a flag can go
/// back to false.
pub struct StageTracker {
    backend: Arc<dyn Backend>,
    work_item: String,
    state: Mutex<StageState>,
}

impl StageTracker {
    pub fn new(backend: Arc<dyn Backend>, work_item: impl Into<String>) -> Self {
        Self {
            backend,
            work_item: work_item.into(),
            state: Mutex::new(StageState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refresh from the backend. On failure the mirror is left untouched.
    pub async fn load(&self) -> Result<StageState, StageError> {
        let state = self.backend.fetch_stage_state(&self.work_item).await?;
        debug!(work_item = %self.work_item, ?state, "Loaded stage state");
        *self.lock() = state;
        Ok(state)
    }

    pub fn set(&self, flag: StageFlag) {
        self.lock().set(flag);
    }

    pub fn replace(&self, state: StageState) {
        *self.lock() = state;
    }

    pub fn snapshot(&self) -> StageState {
        *self.lock()
    }

    pub fn work_item(&self) -> &str {
        &self.work_item
    }
}
