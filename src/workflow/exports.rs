use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Active {
    /// Index → token of the `begin` that put it there.
    entries: HashMap<usize, u64>,
    next_token: u64,
}

/// Suggestion indices with an export currently in flight.
///
/// Exports of different indices are independent. Each one owns an
/// [`ExportGuard`] for its lifetime, and dropping the guard removes its
/// index however the export ended. A guard only removes the entry it
/// created: after a [`clear`](ExportTracker::clear) and a fresh export of the
/// same index, the older guard leaves the newer entry alone.
#[derive(Clone, Default)]
pub struct ExportTracker {
    active: Arc<Mutex<Active>>,
}

impl ExportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Active> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `index` active. Re-entrant: a second begin just takes over the entry.
    pub fn begin(&self, index: usize) -> u64 {
        let mut active = self.lock();
        active.next_token += 1;
        let token = active.next_token;
        active.entries.insert(index, token);
        token
    }

    pub fn end(&self, index: usize) {
        self.lock().entries.remove(&index);
    }

    fn end_if(&self, index: usize, token: u64) {
        let mut active = self.lock();
        if active.entries.get(&index) == Some(&token) {
            active.entries.remove(&index);
        }
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.lock().entries.contains_key(&index)
    }

    /// Active indices in ascending order.
    pub fn active(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.lock().entries.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Forget every index, e.g. after the suggestion list was replaced.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Mark `index` active until the returned guard is dropped.
    pub fn track(&self, index: usize) -> ExportGuard {
        let token = self.begin(index);
        ExportGuard {
            tracker: self.clone(),
            index,
            token,
        }
    }
}

pub struct ExportGuard {
    tracker: ExportTracker,
    index: usize,
    token: u64,
}

impl ExportGuard {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        self.tracker.end_if(self.index, self.token);
    }
}
