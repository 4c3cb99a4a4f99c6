//! User-facing notices.

/// Weight of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Receives short user-facing messages about session state changes.
///
/// The presentation side decides how to show them (editor toast, terminal
/// line). Calls happen on the session task and must not block.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}
