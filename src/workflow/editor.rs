//! Pending interval edits and their validation.
//!
//! Edits are buffered per suggestion index and shadow the committed timing
//! until they are committed or a full replacement of the suggestion list
//! makes them meaningless. Each buffered entry remembers the registry
//! generation it was made against, so an edit never leaks onto a suggestion
//! that merely happens to occupy the same index after a re-analysis.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::backend::Backend;
use crate::errors::{ConcurrencyError, StageError, ValidationError};
use crate::models::{Interval, IntervalField, Suggestion};
use crate::workflow::registry::SuggestionRegistry;

/// Allowed clip length in seconds, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipBounds {
    pub min: f64,
    pub max: f64,
}

impl ClipBounds {
    pub const DEFAULT: ClipBounds = ClipBounds {
        min: 40.0,
        max: 180.0,
    };

    /// Order is checked before duration.
    pub fn validate(&self, interval: Interval) -> Result<(), ValidationError> {
        if interval.end <= interval.start {
            return Err(ValidationError::InvalidOrder {
                start: interval.start,
                end: interval.end,
            });
        }
        let duration = interval.duration();
        if duration < self.min || duration > self.max {
            return Err(ValidationError::DurationOutOfRange {
                duration,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl Default for ClipBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingEdit {
    start: Option<f64>,
    end: Option<f64>,
    generation: u64,
}

impl PendingEdit {
    fn apply(&self, committed: Interval) -> Interval {
        Interval {
            start: self.start.unwrap_or(committed.start),
            end: self.end.unwrap_or(committed.end),
        }
    }
}

/// Parse user input as seconds. Partial or garbage input yields `None`.
fn parse_seconds(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Edit buffer keyed by suggestion index.
#[derive(Default)]
pub struct IntervalEditor {
    pending: Mutex<HashMap<usize, PendingEdit>>,
}

impl IntervalEditor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<usize, PendingEdit>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer `raw` for one end of the interval at `index`.
    ///
    /// Input that does not parse as a finite number of seconds is ignored and
    /// the previous buffered (or committed) value stays in effect. Returns the
    /// effective interval after the edit.
    pub fn set_pending(
        &self,
        registry: &SuggestionRegistry,
        index: usize,
        field: IntervalField,
        raw: &str,
    ) -> Result<Interval, ValidationError> {
        let (suggestion, generation) = registry.entry(index)?;
        let committed = suggestion.interval();

        let mut pending = self.lock();
        let Some(value) = parse_seconds(raw) else {
            debug!(index, %field, input = raw, "Ignoring non-numeric interval input");
            return Ok(Self::effective_from(pending.get(&index), committed, generation));
        };

        let entry = pending.entry(index).or_insert(PendingEdit {
            start: None,
            end: None,
            generation,
        });
        if entry.generation != generation {
            *entry = PendingEdit {
                start: None,
                end: None,
                generation,
            };
        }
        match field {
            IntervalField::Start => entry.start = Some(value),
            IntervalField::End => entry.end = Some(value),
        }
        Ok(entry.apply(committed))
    }

    fn effective_from(
        edit: Option<&PendingEdit>,
        committed: Interval,
        generation: u64,
    ) -> Interval {
        match edit {
            Some(edit) if edit.generation == generation => edit.apply(committed),
            _ => committed,
        }
    }

    /// The interval shown to the user: buffered override per field, else committed.
    pub fn effective(
        &self,
        registry: &SuggestionRegistry,
        index: usize,
    ) -> Result<Interval, ValidationError> {
        let (suggestion, generation) = registry.entry(index)?;
        Ok(Self::effective_from(
            self.lock().get(&index),
            suggestion.interval(),
            generation,
        ))
    }

    /// Validate and send the effective interval at `index` to the backend.
    ///
    /// Validation failures issue no request and change nothing. On success
    /// the registry entry is replaced with the server's canonical suggestion
    /// and the buffered edit is dropped; on a failed request the edit stays.
    pub async fn commit(
        &self,
        backend: &dyn Backend,
        registry: &SuggestionRegistry,
        bounds: &ClipBounds,
        work_item: &str,
        index: usize,
    ) -> Result<Suggestion, StageError> {
        let (suggestion, generation) = registry.entry(index)?;
        let edit = self.lock().get(&index).copied();
        if edit.is_some_and(|e| e.generation != generation) {
            return Err(ConcurrencyError::StaleSuggestions { index }.into());
        }

        let interval = Self::effective_from(edit.as_ref(), suggestion.interval(), generation);
        bounds.validate(interval)?;

        debug!(work_item, index, start = interval.start, end = interval.end, "Committing interval");
        let updated = backend
            .commit_interval(work_item, index, interval.start, interval.end)
            .await?;

        registry.replace_at_checked(generation, index, updated.clone())?;
        let mut pending = self.lock();
        if pending.get(&index).is_some_and(|e| e.generation == generation) {
            pending.remove(&index);
        }
        info!(work_item, index, start = updated.start, end = updated.end, "Interval committed");
        Ok(updated)
    }

    /// Drop the buffered edit at `index`, if any.
    pub fn discard(&self, index: usize) {
        self.lock().remove(&index);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn pending_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.lock().keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Buffered edits with their effective intervals, for rendering.
    pub fn pending(&self, registry: &SuggestionRegistry) -> BTreeMap<usize, Interval> {
        let generation = registry.generation();
        let items = registry.get();
        self.lock()
            .iter()
            .filter(|(_, edit)| edit.generation == generation)
            .filter_map(|(index, edit)| {
                items
                    .get(*index)
                    .map(|s| (*index, edit.apply(s.interval())))
            })
            .collect()
    }
}
