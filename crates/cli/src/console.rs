//! Stdin transport and terminal presentation for local runs.

use std::path::Path;

use {
    anyhow::Result,
    async_trait::async_trait,
    backseat_annotations::{Annotation, AnnotationSink},
    backseat_chat::{ChatEvent, ChatTransport, NoticeLevel, NoticeSink},
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        sync::mpsc,
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::debug,
};

/// Chat transport that reads lines from standard input.
///
/// Every line is a message from the synthetic sender `console`, which makes
/// the full pipeline exercisable without a chat server. EOF counts as a
/// clean close and cancels the `finished` token so the caller can exit.
pub struct StdinTransport {
    finished: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl StdinTransport {
    #[must_use]
    pub fn new(finished: CancellationToken) -> Self {
        Self {
            finished,
            reader: None,
        }
    }
}

#[async_trait]
impl ChatTransport for StdinTransport {
    async fn connect(&mut self, events: mpsc::Sender<ChatEvent>) -> Result<()> {
        events.send(ChatEvent::Ready).await?;
        let finished = self.finished.clone();
        self.reader = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(text)) => {
                        let message = ChatEvent::Message {
                            sender: "console".into(),
                            text,
                        };
                        if events.send(message).await.is_err() {
                            break;
                        }
                    },
                    Ok(None) => {
                        let _ = events.send(ChatEvent::Closed { error: None }).await;
                        finished.cancel();
                        break;
                    },
                    Err(err) => {
                        let closed = ChatEvent::Closed {
                            error: Some(err.to_string()),
                        };
                        let _ = events.send(closed).await;
                        finished.cancel();
                        break;
                    },
                }
            }
            debug!("stdin reader stopped");
        }));
        Ok(())
    }

    async fn join(&mut self, channel: &str) -> Result<()> {
        // Standard input has no channels; the name only scopes the session.
        debug!(channel = %channel, "joined channel");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            // The reader parks on stdin reads and channel sends, neither of
            // which polls a stop signal. Abort it and reap the handle.
            reader.abort();
            let _ = reader.await;
        }
        Ok(())
    }
}

/// Prints a file's annotation list whenever it changes.
pub struct TerminalAnnotations;

impl AnnotationSink for TerminalAnnotations {
    fn publish(&self, file: &Path, annotations: &[Annotation]) {
        if annotations.is_empty() {
            println!("{}: clear", file.display());
            return;
        }
        println!("{}:", file.display());
        for annotation in annotations {
            println!(
                "  line {:<5} {:<8} {}",
                annotation.line, annotation.severity, annotation.message
            );
        }
    }
}

/// Prints notices as `[backseat]` lines, errors to stderr.
pub struct TerminalNotices;

impl NoticeSink for TerminalNotices {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => println!("[backseat] {message}"),
            NoticeLevel::Error => eprintln!("[backseat] {message}"),
        }
    }
}
