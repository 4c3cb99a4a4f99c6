//! Chat transport contract.
//!
//! The session never speaks a chat protocol itself. A [`ChatTransport`]
//! implementation owns the wire and pushes [`ChatEvent`]s into the channel
//! handed to `connect`; the session side stays protocol-agnostic.

use std::sync::Arc;

use {anyhow::Result, async_trait::async_trait, tokio::sync::mpsc};

/// Events a transport pushes into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The connection is up and the channel is live.
    Ready,
    /// A chat line arrived.
    Message { sender: String, text: String },
    /// A fault that did not take the connection down.
    Error { message: String },
    /// The connection is gone. `error` is `None` for a clean close.
    Closed { error: Option<String> },
}

/// One connection to one chat channel.
///
/// Implementations emit [`ChatEvent::Ready`] once live, then message and
/// error events as they happen, and stop after `disconnect` runs or the
/// event receiver goes away. Dropping the event sender without a
/// [`ChatEvent::Closed`] is treated by the session as an unclean close.
#[async_trait]
pub trait ChatTransport: Send {
    /// Open the connection and hand over the event channel.
    async fn connect(&mut self, events: mpsc::Sender<ChatEvent>) -> Result<()>;

    /// Join a channel by name. Runs after `connect`.
    async fn join(&mut self, channel: &str) -> Result<()>;

    /// Tear the connection down.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Builds a fresh transport for every connect attempt, so a failed or closed
/// connection never poisons the next one.
pub type TransportFactory = Arc<dyn Fn() -> Box<dyn ChatTransport> + Send + Sync>;
