//! Presentation boundary.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::types::Annotation;

/// Receives the full annotation list for a file whenever that list changes.
///
/// The editor side of the pipeline. An implementation replaces whatever it
/// previously showed for `file` with `annotations`, in the given order; an
/// empty slice clears the file's marks. Publishes happen on the session task,
/// so implementations must not block.
pub trait AnnotationSink: Send + Sync {
    fn publish(&self, file: &Path, annotations: &[Annotation]);
}

/// Mutex-backed sink that records every publish. For tests only.
#[derive(Debug, Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(PathBuf, Vec<Annotation>)>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish so far, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<(PathBuf, Vec<Annotation>)> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The most recent list published for `file`, if the file was ever
    /// published.
    #[must_use]
    pub fn latest_for(&self, file: &Path) -> Option<Vec<Annotation>> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|(published_file, _)| published_file == file)
            .map(|(_, annotations)| annotations.clone())
    }

    #[must_use]
    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl AnnotationSink for RecordingSink {
    fn publish(&self, file: &Path, annotations: &[Annotation]) {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((file.to_path_buf(), annotations.to_vec()));
    }
}
