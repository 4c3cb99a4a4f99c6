//! Explicit schedule of pending annotation expiries.

use std::collections::VecDeque;

use crate::types::AnnotationHandle;

#[derive(Debug, Clone)]
pub struct ExpiryEntry {
    pub handle: AnnotationHandle,
    pub due_at_ms: u64,
}

/// FIFO schedule of handle/due-time pairs.
///
/// Every annotation gets the same window, so entries arrive in nondecreasing
/// due order and the front is always the next to fire. Entries are not
/// removed when their annotation goes away early; the store treats a stale
/// pop as a no-op.
#[derive(Debug, Default)]
pub struct ExpirySchedule {
    entries: VecDeque<ExpiryEntry>,
}

impl ExpirySchedule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, handle: AnnotationHandle, due_at_ms: u64) {
        self.entries.push_back(ExpiryEntry { handle, due_at_ms });
    }

    /// Due time of the next entry to fire, if any.
    #[must_use]
    pub fn next_due_at_ms(&self) -> Option<u64> {
        self.entries.front().map(|entry| entry.due_at_ms)
    }

    /// Pop the front entry if its window has elapsed at `now_ms`. An entry
    /// due exactly now counts as due.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<AnnotationHandle> {
        if self
            .entries
            .front()
            .is_some_and(|entry| entry.due_at_ms <= now_ms)
        {
            self.entries.pop_front().map(|entry| entry.handle)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
