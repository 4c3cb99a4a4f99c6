//! Core annotation data types.

use std::{num::NonZeroU32, path::PathBuf};

use {
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Severity of an annotation, from most to least alarming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Map a chat token onto a severity. Tokens are case-sensitive; anything
    /// but `err`, `warn`, `info`, or `hint` is unrecognized.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "err" => Some(Self::Error),
            "warn" => Some(Self::Warning),
            "info" => Some(Self::Info),
            "hint" => Some(Self::Hint),
            _ => None,
        }
    }

    /// The chat token that names this severity.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Error => "err",
            Self::Warning => "warn",
            Self::Info => "info",
            Self::Hint => "hint",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Hint => "hint",
        };
        f.pad(label)
    }
}

/// A validated `help` command, ready to be filed in the store.
///
/// `file_path` has already passed [`crate::path::is_workspace_relative`] and
/// `message` has its whitespace runs collapsed to single spaces; the parser
/// in the chat crate is the only producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRequest {
    /// Workspace-relative path exactly as it appeared in chat.
    pub file_path: String,
    /// 1-based line the annotation attaches to.
    pub line: NonZeroU32,
    pub severity: Severity,
    pub message: String,
}

/// Opaque identity of a single annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(Uuid);

impl AnnotationId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for AnnotationId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Identity returned by `add` and consumed by expiry.
///
/// Carries the resolved file so removal needs no lookup table. Expiring a
/// handle whose annotation is already gone is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationHandle {
    pub id: AnnotationId,
    /// Resolved path the annotation was filed under.
    pub file: PathBuf,
}

/// A live annotation as published to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    /// Workspace-root-resolved path.
    pub file: PathBuf,
    /// 1-based line.
    pub line: NonZeroU32,
    pub severity: Severity,
    pub message: String,
    pub created_at_ms: u64,
}

impl Annotation {
    #[must_use]
    pub fn handle(&self) -> AnnotationHandle {
        AnnotationHandle {
            id: self.id,
            file: self.file.clone(),
        }
    }
}
