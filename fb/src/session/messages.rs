//! Session commands and errors

use gameproto::{DecodeError, EncodeError, FrameError, UnknownTypeError};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

use super::events::ConnState;

/// Errors surfaced to callers of the session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is not ready (state {0:?})")]
    NotReady(ConnState),

    #[error("request timed out")]
    RequestTimeout,

    #[error("session closed")]
    SessionClosed,

    #[error("pending-request table is full (capacity {0})")]
    Backpressure(usize),

    #[error(transparent)]
    UnknownType(#[from] UnknownTypeError),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("frame failed: {0}")]
    Frame(#[from] FrameError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// True when the session itself is gone and retrying through it is
    /// pointless; loops use this to end their pass instead of limping on
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::SessionClosed | SessionError::NotReady(_))
    }
}

/// Response from session operations
pub type SessionResponse<T> = Result<T, SessionError>;

/// Commands sent to the session core task
#[derive(Debug)]
pub(crate) enum Command {
    /// Correlated request; the reply slot resolves exactly once
    Request {
        name: String,
        value: Value,
        reply: oneshot::Sender<SessionResponse<Value>>,
    },

    /// Current connection state
    State { reply: oneshot::Sender<ConnState> },

    /// Graceful close; safe to send any number of times
    Close,
}
