//! Error plumbing shared by the backseat crates.

pub mod error;

pub use error::{Error, FromMessage, Result};
