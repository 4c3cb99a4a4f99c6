#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end session behavior over a scripted transport.

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    anyhow::anyhow,
    async_trait::async_trait,
    backseat_annotations::{RecordingSink, Severity, WorkspaceRoot},
    backseat_chat::{
        ChatEvent, ChatTransport, NoticeLevel, NoticeSink, SessionBuilder, SessionHandle,
        TransportFactory,
    },
    tokio::{sync::mpsc, task::JoinHandle},
};

/// Shared view of everything the scripted transports did, plus the live
/// event sender so tests can inject chat traffic.
#[derive(Default)]
struct TransportLog {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    joins: Mutex<Vec<String>>,
    fail_connect: AtomicBool,
    fail_join: AtomicBool,
    events: Mutex<Option<mpsc::Sender<ChatEvent>>>,
}

impl TransportLog {
    async fn push(&self, event: ChatEvent) {
        let sender = self.events.lock().unwrap().clone();
        sender
            .expect("transport not connected")
            .send(event)
            .await
            .unwrap();
    }

    async fn say(&self, sender: &str, text: &str) {
        self.push(ChatEvent::Message {
            sender: sender.into(),
            text: text.into(),
        })
        .await;
    }
}

struct ScriptedTransport {
    log: Arc<TransportLog>,
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn connect(&mut self, events: mpsc::Sender<ChatEvent>) -> anyhow::Result<()> {
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        if self.log.fail_connect.load(Ordering::SeqCst) {
            return Err(anyhow!("server unreachable"));
        }
        events.send(ChatEvent::Ready).await?;
        *self.log.events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn join(&mut self, channel: &str) -> anyhow::Result<()> {
        if self.log.fail_join.load(Ordering::SeqCst) {
            return Err(anyhow!("channel refused us"));
        }
        self.log.joins.lock().unwrap().push(channel.to_owned());
        Ok(())
    }

    async fn disconnect(&mut self) -> anyhow::Result<()> {
        self.log.disconnects.fetch_add(1, Ordering::SeqCst);
        *self.log.events.lock().unwrap() = None;
        Ok(())
    }
}

/// Transport whose reader pushes messages as fast as the channel accepts
/// them and whose `disconnect` waits for that reader to finish, like a real
/// socket pump would.
struct FloodingTransport {
    disconnects: Arc<AtomicUsize>,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl ChatTransport for FloodingTransport {
    async fn connect(&mut self, events: mpsc::Sender<ChatEvent>) -> anyhow::Result<()> {
        events.send(ChatEvent::Ready).await?;
        self.reader = Some(tokio::spawn(async move {
            for n in 0u64.. {
                let message = ChatEvent::Message {
                    sender: "viewer".into(),
                    text: format!("spam line {n}"),
                };
                if events.send(message).await.is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    async fn join(&mut self, _channel: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> anyhow::Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            reader.await?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotices {
    entries: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotices {
    fn contains(&self, level: NoticeLevel, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|(entry_level, message)| *entry_level == level && message.contains(needle))
    }
}

impl NoticeSink for RecordingNotices {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_owned()));
    }
}

struct Harness {
    handle: SessionHandle,
    task: JoinHandle<()>,
    log: Arc<TransportLog>,
    annotations: Arc<RecordingSink>,
    notices: Arc<RecordingNotices>,
}

fn harness(ttl_ms: u64) -> Harness {
    let log = Arc::new(TransportLog::default());
    let factory: TransportFactory = {
        let log = log.clone();
        Arc::new(move || {
            Box::new(ScriptedTransport { log: log.clone() }) as Box<dyn ChatTransport>
        })
    };
    let annotations = Arc::new(RecordingSink::new());
    let notices = Arc::new(RecordingNotices::default());
    let (handle, task) = SessionBuilder::new(
        WorkspaceRoot::new("/ws"),
        factory,
        annotations.clone(),
        notices.clone(),
    )
    .with_ttl_ms(ttl_ms)
    .spawn();
    Harness {
        handle,
        task,
        log,
        annotations,
        notices,
    }
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn help_command_becomes_annotation() {
    let h = harness(30_000);
    h.handle.connect("rustlings").await.unwrap();
    assert_eq!(h.log.joins.lock().unwrap().as_slice(), ["rustlings"]);

    h.log.say("viewer", "help src/main.rs 7 warn borrow problem here").await;

    eventually("annotation publish", || h.annotations.publish_count() >= 1).await;
    let published = h
        .annotations
        .latest_for(Path::new("/ws/src/main.rs"))
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].line.get(), 7);
    assert_eq!(published[0].severity, Severity::Warning);
    assert_eq!(published[0].message, "borrow problem here");
    assert!(h.notices.contains(NoticeLevel::Info, "Chat is connected and can help"));
}

#[tokio::test]
async fn annotation_expires_after_window() {
    let h = harness(50);
    h.handle.connect("rustlings").await.unwrap();
    h.log.say("viewer", "help src/lib.rs 3 err short lived").await;

    eventually("annotation publish", || h.annotations.publish_count() >= 1).await;
    eventually("expiry publish", || {
        h.annotations
            .latest_for(Path::new("/ws/src/lib.rs"))
            .is_some_and(|list| list.is_empty())
    })
    .await;

    let history = h.annotations.published();
    assert_eq!(history[0].1.len(), 1, "first publish carries the annotation");
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.live_annotations, 0);
    assert_eq!(status.pending_expiries, 0);
}

#[tokio::test]
async fn ordinary_chat_never_publishes() {
    let h = harness(30_000);
    h.handle.connect("rustlings").await.unwrap();

    h.log.say("viewer", "gg that segfault").await;
    h.log.say("viewer", "helper src/a.rs 1 err nope").await;
    h.log.say("viewer", "help ../outside.rs 1 err nope").await;
    h.log.say("viewer", "help src/a.rs zero err nope").await;
    h.log.say("viewer", "help src/a.rs 1 fatal nope").await;
    h.log.say("viewer", "help src/ok.rs 1 info marker").await;

    eventually("the one valid command", || h.annotations.publish_count() >= 1).await;
    assert_eq!(h.annotations.publish_count(), 1);
    let published = h.annotations.latest_for(Path::new("/ws/src/ok.rs")).unwrap();
    assert_eq!(published[0].message, "marker");
}

#[tokio::test]
async fn second_connect_keeps_first_connection() {
    let h = harness(30_000);
    h.handle.connect("rustlings").await.unwrap();
    h.handle.connect("otherchannel").await.unwrap();

    assert_eq!(h.log.connects.load(Ordering::SeqCst), 1);
    assert_eq!(h.log.joins.lock().unwrap().as_slice(), ["rustlings"]);
    assert!(h.notices.contains(NoticeLevel::Info, "You're already connected"));
}

#[tokio::test]
async fn disconnect_clears_annotations_without_republish() {
    let h = harness(30_000);
    h.handle.connect("rustlings").await.unwrap();
    h.log.say("viewer", "help src/main.rs 2 hint look here").await;
    eventually("annotation publish", || h.annotations.publish_count() >= 1).await;

    h.handle.disconnect().await.unwrap();

    assert_eq!(h.log.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(h.annotations.publish_count(), 1, "clearing does not republish");
    let status = h.handle.status().await.unwrap();
    assert!(!status.connected);
    assert_eq!(status.live_annotations, 0);
    assert_eq!(status.pending_expiries, 0);
    assert!(h.notices.contains(NoticeLevel::Info, "🦀 Chat is gone 🦀"));
}

#[tokio::test]
async fn disconnect_without_connection_is_noticed_noop() {
    let h = harness(30_000);
    h.handle.disconnect().await.unwrap();

    assert_eq!(h.log.disconnects.load(Ordering::SeqCst), 0);
    assert!(h.notices.contains(NoticeLevel::Info, "Not connected, nothing to disconnect"));
}

#[tokio::test]
async fn disconnect_completes_under_event_flood() {
    let disconnects = Arc::new(AtomicUsize::new(0));
    let factory: TransportFactory = {
        let disconnects = disconnects.clone();
        Arc::new(move || {
            Box::new(FloodingTransport {
                disconnects: disconnects.clone(),
                reader: None,
            }) as Box<dyn ChatTransport>
        })
    };
    let notices = Arc::new(RecordingNotices::default());
    let (handle, task) = SessionBuilder::new(
        WorkspaceRoot::new("/ws"),
        factory,
        Arc::new(RecordingSink::new()),
        notices.clone(),
    )
    .spawn();

    handle.connect("rustlings").await.unwrap();
    // Let the reader outrun the session and fill the event channel.
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(5), handle.disconnect())
        .await
        .expect("disconnect finished in time")
        .unwrap();
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert!(notices.contains(NoticeLevel::Info, "🦀 Chat is gone 🦀"));
    let status = handle.status().await.unwrap();
    assert!(!status.connected, "session stays responsive after the flood");

    handle.connect("rustlings").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("shutdown finished in time")
        .unwrap();
    task.await.unwrap();
    assert_eq!(disconnects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stale_expiry_after_disconnect_is_silent() {
    let h = harness(500);
    h.handle.connect("rustlings").await.unwrap();
    h.log.say("viewer", "help src/main.rs 9 err doomed").await;
    eventually("annotation publish", || h.annotations.publish_count() >= 1).await;

    h.handle.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(h.annotations.publish_count(), 1, "stale expiry stays silent");
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.live_annotations, 0);
}

#[tokio::test]
async fn annotations_survive_remote_close_and_still_expire() {
    let h = harness(300);
    h.handle.connect("rustlings").await.unwrap();
    h.log.say("viewer", "help src/main.rs 4 info outlives the socket").await;
    eventually("annotation publish", || h.annotations.publish_count() >= 1).await;

    h.log.push(ChatEvent::Closed { error: None }).await;
    eventually_disconnected(&h.handle).await;
    assert!(h.notices.contains(NoticeLevel::Info, "🦀 Chat is gone 🦀"));

    eventually("expiry after close", || {
        h.annotations
            .latest_for(Path::new("/ws/src/main.rs"))
            .is_some_and(|list| list.is_empty())
    })
    .await;
}

#[tokio::test]
async fn transport_error_keeps_session_connected() {
    let h = harness(30_000);
    h.handle.connect("rustlings").await.unwrap();

    h.log.push(ChatEvent::Error { message: "lag spike".into() }).await;
    eventually("error notice", || h.notices.contains(NoticeLevel::Error, "whoopsie")).await;

    let status = h.handle.status().await.unwrap();
    assert!(status.connected);

    h.log.say("viewer", "help src/main.rs 1 info still alive").await;
    eventually("annotation after error", || h.annotations.publish_count() >= 1).await;
}

#[tokio::test]
async fn errored_close_reports_and_allows_reconnect() {
    let h = harness(30_000);
    h.handle.connect("rustlings").await.unwrap();

    h.log
        .push(ChatEvent::Closed { error: Some("server split".into()) })
        .await;
    let needle = "Chat disconnected due to an error and can no longer help";
    eventually("errored close notice", || {
        h.notices.contains(NoticeLevel::Error, needle)
    })
    .await;

    h.handle.connect("rustlings").await.unwrap();
    assert_eq!(h.log.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dropped_event_channel_reports_errored_close() {
    let h = harness(30_000);
    h.handle.connect("rustlings").await.unwrap();

    // Kill the transport side without any goodbye event.
    h.log.events.lock().unwrap().take();

    let needle = "Chat disconnected due to an error and can no longer help";
    eventually("unclean close notice", || {
        h.notices.contains(NoticeLevel::Error, needle)
    })
    .await;
    let status = h.handle.status().await.unwrap();
    assert!(!status.connected);

    h.handle.connect("rustlings").await.unwrap();
    assert_eq!(h.log.connects.load(Ordering::SeqCst), 2);
    let status = h.handle.status().await.unwrap();
    assert!(status.connected);
}

#[tokio::test]
async fn connect_failure_reports_and_allows_retry() {
    let h = harness(30_000);
    h.log.fail_connect.store(true, Ordering::SeqCst);

    let err = h.handle.connect("rustlings").await.unwrap_err();
    assert!(err.to_string().contains("connecting chat transport"));
    assert_eq!(h.log.disconnects.load(Ordering::SeqCst), 1);
    assert!(h.notices.contains(NoticeLevel::Error, "Chat connection failed"));

    h.log.fail_connect.store(false, Ordering::SeqCst);
    h.handle.connect("rustlings").await.unwrap();
    let status = h.handle.status().await.unwrap();
    assert!(status.connected);
}

#[tokio::test]
async fn join_failure_tears_the_transport_down() {
    let h = harness(30_000);
    h.log.fail_join.store(true, Ordering::SeqCst);

    let err = h.handle.connect("rustlings").await.unwrap_err();
    assert!(err.to_string().contains("joining channel"));
    assert_eq!(h.log.disconnects.load(Ordering::SeqCst), 1);
    assert!(h.notices.contains(NoticeLevel::Error, "Chat connection failed"));
    let status = h.handle.status().await.unwrap();
    assert!(!status.connected);

    h.log.fail_join.store(false, Ordering::SeqCst);
    h.handle.connect("rustlings").await.unwrap();
    let status = h.handle.status().await.unwrap();
    assert!(status.connected);
    assert_eq!(status.channel.as_deref(), Some("rustlings"));
}

#[tokio::test]
async fn shutdown_clears_and_stops() {
    let h = harness(30_000);
    h.handle.connect("rustlings").await.unwrap();
    h.log.say("viewer", "help src/main.rs 5 warn about to vanish").await;
    eventually("annotation publish", || h.annotations.publish_count() >= 1).await;

    h.handle.shutdown().await.unwrap();
    h.task.await.unwrap();

    assert!(h.notices.contains(NoticeLevel::Info, "🦀 Chat is gone 🦀"));
    assert_eq!(h.annotations.publish_count(), 1, "teardown does not republish");
    assert!(h.handle.status().await.is_err(), "session is gone");
}

async fn eventually_disconnected(handle: &SessionHandle) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if !handle.status().await.unwrap().connected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for the connection to drop"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
