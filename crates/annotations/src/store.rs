//! In-memory annotation store with per-file publication and scheduled expiry.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::debug;

use crate::{
    clock::{Clock, SystemClock},
    expiry::ExpirySchedule,
    path::WorkspaceRoot,
    sink::AnnotationSink,
    types::{Annotation, AnnotationHandle, AnnotationId, AnnotationRequest},
};

/// How long an annotation lives, in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 30_000;

/// Live annotations keyed by resolved file path, plus the schedule that
/// removes them.
///
/// Single-owner by design: the session task holds the store and every
/// operation completes synchronously, so no two operations ever interleave.
/// Per-file lists keep insertion order.
pub struct AnnotationStore {
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn AnnotationSink>,
    files: HashMap<PathBuf, Vec<Annotation>>,
    schedule: ExpirySchedule,
}

impl AnnotationStore {
    #[must_use]
    pub fn new(sink: Arc<dyn AnnotationSink>) -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            clock: Arc::new(SystemClock),
            sink,
            files: HashMap::new(),
            schedule: ExpirySchedule::new(),
        }
    }

    /// Replace the wall clock, usually with a [`crate::clock::ManualClock`].
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shrink the expiry window. Not user-facing; tests use this to avoid
    /// waiting out the full 30 seconds.
    #[must_use]
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// File an annotation under the request's resolved path.
    ///
    /// Appends to the file's list, publishes the file's full updated list,
    /// and schedules removal one window from now. The returned handle is the
    /// annotation's identity for that removal.
    pub fn add(&mut self, request: &AnnotationRequest, root: &WorkspaceRoot) -> AnnotationHandle {
        let file = root.resolve(&request.file_path);
        let now_ms = self.clock.now_ms();
        let annotation = Annotation {
            id: AnnotationId::new(),
            file: file.clone(),
            line: request.line,
            severity: request.severity,
            message: request.message.clone(),
            created_at_ms: now_ms,
        };
        let handle = annotation.handle();
        let list = self.files.entry(file.clone()).or_default();
        list.push(annotation);
        self.sink.publish(&file, list);
        self.schedule.schedule(handle.clone(), now_ms + self.ttl_ms);
        debug!(id = %handle.id, file = %file.display(), "annotation added");
        handle
    }

    /// Remove the annotation the handle points at, if it is still present.
    ///
    /// Publishes the file's updated (possibly empty) list on removal.
    /// Expiring an annotation that is already gone, because the store was
    /// cleared or the handle fired before, is a silent no-op with no
    /// republish, so a stale schedule entry can never disturb the store.
    pub fn expire(&mut self, handle: &AnnotationHandle) -> bool {
        let Some(list) = self.files.get_mut(&handle.file) else {
            return false;
        };
        let before = list.len();
        list.retain(|annotation| annotation.id != handle.id);
        if list.len() == before {
            return false;
        }
        let remaining = list.clone();
        if remaining.is_empty() {
            self.files.remove(&handle.file);
        }
        self.sink.publish(&handle.file, &remaining);
        debug!(id = %handle.id, file = %handle.file.display(), "annotation expired");
        true
    }

    /// Drop every annotation and every pending expiry without publishing.
    ///
    /// Teardown only: the presentation layer is going away with the session,
    /// so there is nothing left to repaint.
    pub fn clear_all(&mut self) {
        let dropped = self.len();
        self.files.clear();
        self.schedule.clear();
        if dropped > 0 {
            debug!(dropped, "annotation store cleared");
        }
    }

    /// Due time of the next scheduled expiry, stale entries included.
    #[must_use]
    pub fn next_due_at_ms(&self) -> Option<u64> {
        self.schedule.next_due_at_ms()
    }

    /// Expire every annotation whose window has elapsed. Returns how many
    /// were actually removed, which can be fewer than the entries popped.
    pub fn expire_due(&mut self) -> usize {
        let now_ms = self.clock.now_ms();
        let mut removed = 0;
        while let Some(handle) = self.schedule.pop_due(now_ms) {
            if self.expire(&handle) {
                removed += 1;
            }
        }
        removed
    }

    /// Annotations currently filed under `file`, in insertion order.
    #[must_use]
    pub fn annotations_for(&self, file: &Path) -> &[Annotation] {
        self.files.get(file).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total live annotations across all files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Schedule entries not yet fired, stale ones included.
    #[must_use]
    pub fn pending_expiries(&self) -> usize {
        self.schedule.len()
    }
}
