use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::{ConcurrencyError, StageError, ValidationError};
use crate::models::Suggestion;

struct Inner {
    items: Vec<Suggestion>,
    /// Bumped on every full replacement; index identity is only meaningful
    /// within one generation.
    generation: u64,
}

/// Ordered list of clip suggestions for one work item.
///
/// Suggestions are addressed by position. A full replacement starts a new
/// generation, which invalidates every index handed out before it.
pub struct SuggestionRegistry {
    inner: Mutex<Inner>,
}

impl Default for SuggestionRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SuggestionRegistry {
    pub fn new(items: Vec<Suggestion>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Discard the current contents. Returns the new generation.
    pub fn replace_all(&self, items: Vec<Suggestion>) -> u64 {
        let mut inner = self.lock();
        inner.items = items;
        inner.generation += 1;
        inner.generation
    }

    /// Replace one entry, keeping order and length. Out-of-range is a no-op error.
    pub fn replace_at(&self, index: usize, suggestion: Suggestion) -> Result<(), ValidationError> {
        let mut inner = self.lock();
        let len = inner.items.len();
        match inner.items.get_mut(index) {
            Some(slot) => {
                *slot = suggestion;
                Ok(())
            }
            None => Err(ValidationError::IndexOutOfRange { index, len }),
        }
    }

    /// `replace_at` that only applies if no full replacement happened since
    /// `generation` was observed.
    pub fn replace_at_checked(
        &self,
        generation: u64,
        index: usize,
        suggestion: Suggestion,
    ) -> Result<(), StageError> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(ConcurrencyError::StaleSuggestions { index }.into());
        }
        let len = inner.items.len();
        let slot = inner
            .items
            .get_mut(index)
            .ok_or(ValidationError::IndexOutOfRange { index, len })?;
        *slot = suggestion;
        Ok(())
    }

    pub fn get(&self) -> Vec<Suggestion> {
        self.lock().items.clone()
    }

    pub fn get_at(&self, index: usize) -> Option<Suggestion> {
        self.lock().items.get(index).cloned()
    }

    /// Entry at `index` together with the generation it belongs to.
    pub fn entry(&self, index: usize) -> Result<(Suggestion, u64), ValidationError> {
        let inner = self.lock();
        inner
            .items
            .get(index)
            .cloned()
            .map(|s| (s, inner.generation))
            .ok_or(ValidationError::IndexOutOfRange {
                index,
                len: inner.items.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clips(n: usize) -> Vec<Suggestion> {
        (0..n)
            .map(|i| Suggestion::new(format!("clip {}", i), i as f64 * 100.0, i as f64 * 100.0 + 60.0))
            .collect()
    }

    #[test]
    fn test_replace_all_discards_previous_contents() {
        let registry = SuggestionRegistry::new(clips(5));
        let generation = registry.replace_all(clips(2));
        assert_eq!(registry.len(), 2);
        assert_eq!(generation, 1);
        assert_eq!(registry.generation(), 1);
    }

    #[test]
    fn test_replace_at_preserves_order_and_length() {
        let registry = SuggestionRegistry::new(clips(3));
        let updated = Suggestion::new("edited", 110.0, 170.0);
        registry.replace_at(1, updated.clone()).unwrap();

        let items = registry.get();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "clip 0");
        assert_eq!(items[1], updated);
        assert_eq!(items[2].title, "clip 2");
        // Index replacement does not start a new generation.
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn test_replace_at_out_of_range_is_noop() {
        let registry = SuggestionRegistry::new(clips(2));
        let before = registry.get();
        let err = registry
            .replace_at(2, Suggestion::new("x", 0.0, 60.0))
            .unwrap_err();
        assert_eq!(err, ValidationError::IndexOutOfRange { index: 2, len: 2 });
        assert_eq!(registry.get(), before);
    }

    #[test]
    fn test_replace_at_checked_rejects_stale_generation() {
        let registry = SuggestionRegistry::new(clips(3));
        let observed = registry.generation();
        registry.replace_all(clips(3));

        let err = registry
            .replace_at_checked(observed, 0, Suggestion::new("late", 0.0, 60.0))
            .unwrap_err();
        assert_eq!(
            err,
            StageError::Concurrency(ConcurrencyError::StaleSuggestions { index: 0 })
        );
        assert_eq!(registry.get()[0].title, "clip 0");
    }

    #[test]
    fn test_replace_at_checked_applies_current_generation() {
        let registry = SuggestionRegistry::new(clips(2));
        let generation = registry.generation();
        registry
            .replace_at_checked(generation, 1, Suggestion::new("ok", 100.0, 150.0))
            .unwrap();
        assert_eq!(registry.get_at(1).unwrap().title, "ok");
    }

    #[test]
    fn test_entry_reports_generation() {
        let registry = SuggestionRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.entry(0).is_err());
        registry.replace_all(clips(1));
        let (s, generation) = registry.entry(0).unwrap();
        assert_eq!(s.title, "clip 0");
        assert_eq!(generation, 1);
    }
}
