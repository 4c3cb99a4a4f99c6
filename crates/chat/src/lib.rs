//! Chat side of backseat: the `help` command and the session that turns
//! chat lines into annotations.
//!
//! A session owns an annotation store and at most one connection to a chat
//! channel. The concrete chat protocol sits behind [`ChatTransport`]; the
//! session dispatches transport events on a single task alongside user
//! commands and annotation expiries, so nothing needs a lock.

pub mod command;
pub mod connection;
pub mod error;
pub mod notice;
pub mod session;

pub use {
    command::parse_help,
    connection::{ChatEvent, ChatTransport, TransportFactory},
    error::{Error, Result},
    notice::{NoticeLevel, NoticeSink},
    session::{SessionBuilder, SessionHandle, SessionStatus},
};
