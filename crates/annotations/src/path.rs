//! Workspace path boundary for untrusted chat input.

use std::path::{Component, Path, PathBuf};

/// Root directory chat-supplied paths resolve under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot(PathBuf);

impl WorkspaceRoot {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Join a chat-supplied relative path under the root.
    ///
    /// Purely lexical: no filesystem access, and the file need not exist.
    /// Callers gate input through [`is_workspace_relative`] first.
    #[must_use]
    pub fn resolve(&self, file_path: &str) -> PathBuf {
        self.0.join(file_path)
    }
}

/// Whether a chat-supplied path may be resolved against the workspace root.
///
/// Rejects the empty string, anything containing `..` (even embedded in a
/// file name), and anything carrying a root or drive-prefix component. Chat
/// input is untrusted, so the substring check is deliberately broader than
/// component-level traversal detection.
#[must_use]
pub fn is_workspace_relative(candidate: &str) -> bool {
    if candidate.is_empty() || candidate.contains("..") {
        return false;
    }
    Path::new(candidate)
        .components()
        .all(|component| !matches!(component, Component::RootDir | Component::Prefix(_)))
}
