//! Transient per-file editor annotations.
//!
//! The passive half of backseat. An in-memory [`AnnotationStore`] publishes
//! per-file annotation lists to an [`AnnotationSink`] and removes each
//! annotation a fixed window after it was added; [`path`] guards the
//! workspace boundary against untrusted chat input. Nothing in this crate
//! spawns tasks or blocks; the chat session owns a store and drives it from
//! a single task.

pub mod clock;
pub mod expiry;
pub mod path;
pub mod sink;
pub mod store;
pub mod types;

pub use {
    clock::{Clock, ManualClock, SystemClock},
    path::{WorkspaceRoot, is_workspace_relative},
    sink::{AnnotationSink, RecordingSink},
    store::{AnnotationStore, DEFAULT_TTL_MS},
    types::{Annotation, AnnotationHandle, AnnotationId, AnnotationRequest, Severity},
};
