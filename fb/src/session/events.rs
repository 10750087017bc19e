//! Session lifecycle events and connection state
//!
//! Lifecycle transitions surface as a broadcast stream of tagged events
//! consumed by the loop supervisor and the entry point, which keeps session
//! internals decoupled from start/stop policy.

use std::fmt;

/// Connection state machine
///
/// `Connecting → Authenticating → Ready → Closing → Closed`, with a direct
/// jump to `Closed` from anywhere on an unrecoverable transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Authenticating,
    Ready,
    Closing,
    Closed,
}

/// Why a ready session went away
///
/// Deliberate local `close()` does not produce a reason; only involuntary
/// closures are broadcast, so the entry point can tell "authentication
/// rejected" from "connection dropped after success".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Three consecutive keepalives went unacknowledged
    HeartbeatLost,

    /// The server closed the stream
    PeerClosed,

    /// Transport-level failure
    Io(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::HeartbeatLost => write!(f, "heartbeat acknowledgements lost"),
            DisconnectReason::PeerClosed => write!(f, "peer closed the connection"),
            DisconnectReason::Io(detail) => write!(f, "transport error: {detail}"),
        }
    }
}

/// Broadcast on session lifecycle transitions
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Login confirmed; the session is Ready
    LoginSucceeded { farmer_id: u64 },

    /// The backend rejected the credential
    LoginFailed { reason: String },

    /// A ready session was lost
    Disconnected { reason: DisconnectReason },
}
