//! Cloneable session handle

use std::sync::Arc;

use gameproto::SchemaRegistry;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::info;

use crate::credential::Credential;
use crate::state::StateCache;

use super::config::SessionConfig;
use super::core::{Core, read_loop};
use super::events::{ConnState, SessionEvent};
use super::messages::{Command, SessionError};

/// Handle to a running session
///
/// Cheap to clone; all clones talk to the same core task. Dropping every
/// clone closes the session (the core sees its command channel end).
#[derive(Clone)]
pub struct Session {
    cmd_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Open a TCP connection to the backend and start the login handshake
    ///
    /// Returns as soon as the session tasks are running, along with an event
    /// receiver created before the handshake can possibly resolve, so the
    /// login outcome is never missed.
    pub async fn connect(
        addr: &str,
        config: SessionConfig,
        registry: Arc<SchemaRegistry>,
        cache: Arc<StateCache>,
        credential: Credential,
    ) -> Result<(Session, broadcast::Receiver<SessionEvent>), SessionError> {
        info!(%addr, "connecting to backend");
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::spawn(stream, config, registry, cache, credential))
    }

    /// Start a session over an already-open duplex stream
    ///
    /// This is the seam integration tests use with `tokio::io::duplex`.
    pub fn spawn<S>(
        stream: S,
        config: SessionConfig,
        registry: Arc<SchemaRegistry>,
        cache: Arc<StateCache>,
        credential: Credential,
    ) -> (Session, broadcast::Receiver<SessionEvent>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        // The receiver exists before the core task does, so no event can be
        // emitted unobserved
        let (event_tx, event_rx) = broadcast::channel(32);

        tokio::spawn(read_loop(reader, inbound_tx));
        let core = Core::new(writer, config, registry, cache, credential, event_tx.clone());
        tokio::spawn(core.run(cmd_rx, inbound_rx));

        (Session { cmd_tx, event_tx }, event_rx)
    }

    /// Issue a correlated request and wait for its response
    ///
    /// Fails fast with [`SessionError::NotReady`] unless the session has
    /// finished its login handshake. Resolution is exactly once: the
    /// matching response, a timeout, or close-time rejection.
    pub async fn request(&self, name: &str, value: Value) -> Result<Value, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Request {
                name: name.to_string(),
                value,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        reply_rx.await.map_err(|_| SessionError::SessionClosed)?
    }

    /// Current connection state; `Closed` once the core task is gone
    pub async fn state(&self) -> ConnState {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::State { reply: reply_tx }).await.is_err() {
            return ConnState::Closed;
        }
        reply_rx.await.unwrap_or(ConnState::Closed)
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Close the session; idempotent
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close).await;
    }
}
