//! The chat session: one task that owns the annotation store.
//!
//! A session holds at most one live connection. Transport events and user
//! commands are dispatched on the session task together with annotation
//! expiries, so store mutations are serialized without locks. Handles talk
//! to the task over a command channel and outlive any one connection.

use std::{sync::Arc, time::Duration};

use {
    backseat_annotations::{
        AnnotationSink, AnnotationStore, Clock, DEFAULT_TTL_MS, SystemClock, WorkspaceRoot,
    },
    serde::Serialize,
    tokio::{
        sync::{mpsc, oneshot},
        task::JoinHandle,
    },
    tracing::{debug, error, info, warn},
};

use crate::{
    command::parse_help,
    connection::{ChatEvent, ChatTransport, TransportFactory},
    error::{Error, Result},
    notice::{NoticeLevel, NoticeSink},
};

/// Point-in-time view of a running session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub connected: bool,
    pub channel: Option<String>,
    pub live_annotations: usize,
    pub pending_expiries: usize,
}

enum SessionCommand {
    Connect {
        channel: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct ActiveConnection {
    transport: Box<dyn ChatTransport>,
    channel: String,
    events: mpsc::Receiver<ChatEvent>,
}

/// Configures and spawns a session task.
pub struct SessionBuilder {
    root: WorkspaceRoot,
    factory: TransportFactory,
    annotations: Arc<dyn AnnotationSink>,
    notices: Arc<dyn NoticeSink>,
    clock: Arc<dyn Clock>,
    ttl_ms: u64,
}

impl SessionBuilder {
    #[must_use]
    pub fn new(
        root: WorkspaceRoot,
        factory: TransportFactory,
        annotations: Arc<dyn AnnotationSink>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            root,
            factory,
            annotations,
            notices,
            clock: Arc::new(SystemClock),
            ttl_ms: DEFAULT_TTL_MS,
        }
    }

    /// Replace the wall clock.
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

    /// Spawn the session task. The task runs until [`SessionHandle::shutdown`]
    /// or until every handle is dropped.
    #[must_use]
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let store = AnnotationStore::new(self.annotations)
            .with_clock(self.clock.clone())
            .with_ttl_ms(self.ttl_ms);
        let session = Session {
            store,
            root: self.root,
            factory: self.factory,
            notices: self.notices,
            clock: self.clock,
            connection: None,
            commands: command_rx,
        };
        let task = tokio::spawn(session.run());
        (
            SessionHandle {
                commands: command_tx,
            },
            task,
        )
    }
}

/// Cloneable control surface for a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Connect to a channel.
    ///
    /// A session that is already connected keeps its current channel: the
    /// user gets a notice and the call returns `Ok`. Transport failures come
    /// back as [`Error::External`] and leave the session ready for another
    /// attempt.
    pub async fn connect(&self, channel: impl Into<String>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Connect {
                channel: channel.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::SessionClosed)?;
        reply_rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Disconnect and drop all annotations.
    ///
    /// Disconnecting a session that is not connected is a no-op with a
    /// notice, not an error.
    pub async fn disconnect(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Disconnect { reply: reply_tx })
            .await
            .map_err(|_| Error::SessionClosed)?;
        reply_rx.await.map_err(|_| Error::SessionClosed)?
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Status { reply: reply_tx })
            .await
            .map_err(|_| Error::SessionClosed)?;
        reply_rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Tear the session down: disconnect if connected, drop all annotations,
    /// stop the task. Returns once teardown finished.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| Error::SessionClosed)?;
        reply_rx.await.map_err(|_| Error::SessionClosed)
    }
}

struct Session {
    store: AnnotationStore,
    root: WorkspaceRoot,
    factory: TransportFactory,
    notices: Arc<dyn NoticeSink>,
    clock: Arc<dyn Clock>,
    connection: Option<ActiveConnection>,
    commands: mpsc::Receiver<SessionCommand>,
}

impl Session {
    async fn run(mut self) {
        loop {
            let due_in_ms = self
                .store
                .next_due_at_ms()
                .map(|due| due.saturating_sub(self.clock.now_ms()));
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    },
                    None => break,
                },
                event = next_chat_event(&mut self.connection) => self.handle_event(event),
                () = expiry_elapsed(due_in_ms) => {
                    let removed = self.store.expire_due();
                    if removed > 0 {
                        debug!(removed, "annotations expired");
                    }
                },
            }
        }
        self.teardown().await;
    }

    /// Returns false once the session should stop.
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Connect { channel, reply } => {
                let result = self.connect(channel).await;
                let _ = reply.send(result);
                true
            },
            SessionCommand::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(Ok(()));
                true
            },
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.status());
                true
            },
            SessionCommand::Shutdown { reply } => {
                self.teardown().await;
                let _ = reply.send(());
                false
            },
        }
    }

    async fn connect(&mut self, channel: String) -> Result<()> {
        if self.connection.is_some() {
            self.notices.notify(
                NoticeLevel::Info,
                "You're already connected, disconnect first to switch channels",
            );
            return Ok(());
        }

        let mut transport = (self.factory)();
        let (event_tx, event_rx) = mpsc::channel(64);
        if let Err(err) = transport.connect(event_tx).await {
            error!(channel = %channel, error = %err, "chat transport connect failed");
            close_transport(transport, &channel, event_rx).await;
            self.notices.notify(NoticeLevel::Error, "Chat connection failed");
            return Err(Error::external("connecting chat transport", err));
        }
        if let Err(err) = transport.join(&channel).await {
            error!(channel = %channel, error = %err, "joining channel failed");
            close_transport(transport, &channel, event_rx).await;
            self.notices.notify(NoticeLevel::Error, "Chat connection failed");
            return Err(Error::external("joining channel", err));
        }

        info!(channel = %channel, "chat transport opened");
        self.connection = Some(ActiveConnection {
            transport,
            channel,
            events: event_rx,
        });
        Ok(())
    }

    async fn disconnect(&mut self) {
        match self.connection.take() {
            Some(connection) => {
                let ActiveConnection { transport, channel, events } = connection;
                // The reference and the annotations go away even when the
                // transport refuses to die.
                close_transport(transport, &channel, events).await;
                self.store.clear_all();
                info!(channel = %channel, "chat disconnected");
                self.notices.notify(NoticeLevel::Info, "🦀 Chat is gone 🦀");
            },
            None => {
                self.notices
                    .notify(NoticeLevel::Info, "Not connected, nothing to disconnect");
            },
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            connected: self.connection.is_some(),
            channel: self
                .connection
                .as_ref()
                .map(|connection| connection.channel.clone()),
            live_annotations: self.store.len(),
            pending_expiries: self.store.pending_expiries(),
        }
    }

    fn handle_event(&mut self, event: Option<ChatEvent>) {
        let Some(event) = event else {
            // Transport dropped its sender without saying goodbye.
            self.handle_closed(Some("connection lost".into()));
            return;
        };
        match event {
            ChatEvent::Ready => {
                info!("chat connected");
                self.notices
                    .notify(NoticeLevel::Info, "Chat is connected and can help");
            },
            ChatEvent::Message { sender, text } => self.handle_message(&sender, &text),
            ChatEvent::Error { message } => {
                error!(error = %message, "chat transport error");
                self.notices.notify(NoticeLevel::Error, "whoopsie");
            },
            ChatEvent::Closed { error } => self.handle_closed(error),
        }
    }

    fn handle_message(&mut self, sender: &str, text: &str) {
        let Some(request) = parse_help(text) else {
            return;
        };
        let handle = self.store.add(&request, &self.root);
        info!(
            id = %handle.id,
            sender = %sender,
            file = %request.file_path,
            line = request.line.get(),
            severity = %request.severity,
            "annotation added from chat"
        );
    }

    fn handle_closed(&mut self, error: Option<String>) {
        // Drop the connection reference either way so a fresh connect stays
        // possible. Live annotations keep their expiry schedule.
        self.connection = None;
        match error {
            Some(message) => {
                error!(error = %message, "chat connection closed");
                self.notices.notify(
                    NoticeLevel::Error,
                    "Chat disconnected due to an error and can no longer help",
                );
            },
            None => {
                info!("chat connection closed");
                self.notices.notify(NoticeLevel::Info, "🦀 Chat is gone 🦀");
            },
        }
    }

    async fn teardown(&mut self) {
        if let Some(connection) = self.connection.take() {
            let ActiveConnection { transport, channel, events } = connection;
            close_transport(transport, &channel, events).await;
            self.notices.notify(NoticeLevel::Info, "🦀 Chat is gone 🦀");
        }
        self.store.clear_all();
    }
}

/// Drops the event receiver before asking the transport to stop: a reader
/// blocked sending into the full event channel only unblocks once the
/// receiver is gone.
async fn close_transport(
    mut transport: Box<dyn ChatTransport>,
    channel: &str,
    events: mpsc::Receiver<ChatEvent>,
) {
    drop(events);
    if let Err(err) = transport.disconnect().await {
        warn!(channel = %channel, error = %err, "chat transport disconnect failed");
    }
}

async fn next_chat_event(connection: &mut Option<ActiveConnection>) -> Option<ChatEvent> {
    match connection.as_mut() {
        Some(connection) => connection.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn expiry_elapsed(due_in_ms: Option<u64>) {
    match due_in_ms {
        Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        None => std::future::pending().await,
    }
}
