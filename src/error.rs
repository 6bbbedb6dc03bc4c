//! Listener error types

use std::io;

use crate::format::FormatError;
use crate::remote::TransportFailure;

pub type Result<T> = std::result::Result<T, ListenerError>;

/// Errors raised by listener operations
///
/// Every variant is scoped to the failing call; none of them poisons the
/// listener for later calls.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Template and arguments did not match; nothing was written
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    /// The destination rejected a write or flush
    #[error("destination write failed: {0}")]
    Io(io::Error),
    /// The remote transport could not export, resolve, or forward
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ListenerError {
    pub fn transport(msg: impl Into<String>) -> Self {
        ListenerError::Transport(msg.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ListenerError::Transport(_))
    }
}

impl From<io::Error> for ListenerError {
    fn from(err: io::Error) -> Self {
        let failure = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<TransportFailure>())
            .map(|failure| failure.to_string());
        match failure {
            Some(msg) => ListenerError::Transport(msg),
            None => ListenerError::Io(err),
        }
    }
}
