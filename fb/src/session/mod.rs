//! Transport/session engine
//!
//! Owns the duplex connection to the backend: login handshake, heartbeat,
//! sequence-tagged sends, inbound dispatch, and the pending-request
//! correlation table. Shaped as an actor: a cloneable [`Session`] handle
//! sends commands over a channel to a core task that owns the socket's write
//! half and all mutable session state; a reader task owns the read half.

mod config;
mod core;
mod events;
mod handle;
mod messages;
mod pending;

pub use config::SessionConfig;
pub use events::{ConnState, DisconnectReason, SessionEvent};
pub use handle::Session;
pub use messages::{SessionError, SessionResponse};
