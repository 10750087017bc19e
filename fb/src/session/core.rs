//! Session core task - owns the socket and all mutable session state
//!
//! One task, one `tokio::select!`: commands from handles, frames from the
//! reader task, the heartbeat tick, and the timeout sweep. Because the core
//! is the only writer of the pending table and the connection state, every
//! reply slot resolves exactly once without any locking.

use std::sync::Arc;

use gameproto::{Frame, FrameError, MAX_FRAME_BYTES, SchemaRegistry, codec, msg, read_frame, write_frame};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::state::StateCache;

use super::config::SessionConfig;
use super::events::{ConnState, DisconnectReason, SessionEvent};
use super::messages::{Command, SessionError, SessionResponse};
use super::pending::{PendingRequest, PendingTable};

/// Consecutive unacknowledged keepalives that close the session
const MAX_MISSED_BEATS: u8 = 3;

/// Cadence of the pending-request timeout sweep
const SWEEP_INTERVAL: Duration = Duration::from_millis(50);

/// What the reader task feeds the core
#[derive(Debug)]
pub(crate) enum Inbound {
    Frame(Frame),
    Eof,
    Error(std::io::Error),
}

/// Pump frames off the read half until the stream ends
pub(crate) async fn read_loop<R>(mut reader: R, tx: mpsc::Sender<Inbound>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader, MAX_FRAME_BYTES).await {
            Ok(Some(frame)) => {
                if tx.send(Inbound::Frame(frame)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                let _ = tx.send(Inbound::Eof).await;
                break;
            }
            Err(FrameError::Io(error)) => {
                let _ = tx.send(Inbound::Error(error)).await;
                break;
            }
            Err(error) => {
                let _ = tx.send(Inbound::Error(std::io::Error::other(error))).await;
                break;
            }
        }
    }
}

/// The session actor
pub(crate) struct Core<W> {
    writer: W,
    config: SessionConfig,
    registry: Arc<SchemaRegistry>,
    cache: Arc<StateCache>,
    credential: Credential,
    state: ConnState,
    pending: PendingTable,
    next_seq: u32,
    login_seq: Option<u32>,
    missed_beats: u8,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl<W> Core<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        writer: W,
        config: SessionConfig,
        registry: Arc<SchemaRegistry>,
        cache: Arc<StateCache>,
        credential: Credential,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let pending = PendingTable::new(config.pending_capacity);
        Self {
            writer,
            config,
            registry,
            cache,
            credential,
            state: ConnState::Connecting,
            pending,
            next_seq: 1,
            login_seq: None,
            missed_beats: 0,
            event_tx,
        }
    }

    /// Drive the session until it is Closed
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, mut inbound_rx: mpsc::Receiver<Inbound>) {
        if let Err(error) = self.send_login().await {
            warn!(%error, "failed to transmit login request");
            self.emit(SessionEvent::LoginFailed {
                reason: error.to_string(),
            });
            self.shutdown(None).await;
            return;
        }

        let mut heartbeat = tokio::time::interval_at(
            Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep = tokio::time::interval_at(Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state != ConnState::Closed {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(Command::Request { name, value, reply }) => self.handle_request(name, value, reply).await,
                    Some(Command::State { reply }) => {
                        let _ = reply.send(self.state);
                    }
                    Some(Command::Close) | None => self.shutdown(None).await,
                },
                inbound = inbound_rx.recv() => match inbound {
                    Some(Inbound::Frame(frame)) => self.handle_frame(frame).await,
                    Some(Inbound::Eof) | None => self.connection_lost(DisconnectReason::PeerClosed).await,
                    Some(Inbound::Error(error)) => {
                        self.connection_lost(DisconnectReason::Io(error.to_string())).await;
                    }
                },
                _ = heartbeat.tick(), if self.state == ConnState::Ready => self.heartbeat_tick().await,
                _ = sweep.tick() => self.sweep_timeouts(),
            }
        }
    }

    fn next_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.event_tx.send(event);
    }

    async fn transmit(&mut self, name: &str, seq: u32, value: &Value) -> Result<(), SessionError> {
        let wire_id = self.registry.wire_id(name)?;
        let payload = codec::encode(&self.registry, name, value)?;
        let frame = Frame { wire_id, seq, payload };
        write_frame(&mut self.writer, &frame, MAX_FRAME_BYTES).await?;
        Ok(())
    }

    /// The one send allowed outside Ready
    async fn send_login(&mut self) -> Result<(), SessionError> {
        self.state = ConnState::Authenticating;
        let value = json!({
            "code": self.credential.code,
            "platform": self.credential.platform.wire_value(),
            "version": self.config.client_version,
        });
        let seq = self.next_seq();
        self.login_seq = Some(seq);
        debug!(seq, "sending login request");
        self.transmit(msg::LOGIN_REQUEST, seq, &value).await
    }

    async fn handle_request(&mut self, name: String, value: Value, reply: oneshot::Sender<SessionResponse<Value>>) {
        if self.state != ConnState::Ready {
            let _ = reply.send(Err(SessionError::NotReady(self.state)));
            return;
        }

        let seq = self.next_seq();
        let entry = PendingRequest {
            name: name.clone(),
            reply,
            deadline: Instant::now() + self.config.request_timeout,
        };
        if let Err(rejected) = self.pending.insert(seq, entry) {
            let _ = rejected.reply.send(Err(SessionError::Backpressure(self.pending.capacity())));
            return;
        }

        if let Err(error) = self.transmit(&name, seq, &value).await {
            if matches!(error, SessionError::Frame(FrameError::Io(_))) {
                warn!(message = %name, %error, "transmit failed, closing session");
                // The drain in shutdown rejects this request too
                self.shutdown(Some(DisconnectReason::Io(error.to_string()))).await;
            } else if let Some(entry) = self.pending.take(seq) {
                // Encode-level failure is fatal to this request only
                let _ = entry.reply.send(Err(error));
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) {
        let name = match self.registry.describe_id(frame.wire_id) {
            Ok(descriptor) => descriptor.name().to_string(),
            Err(_) => {
                warn!(wire_id = frame.wire_id, seq = frame.seq, "dropping frame with unknown message type");
                return;
            }
        };

        if self.login_seq == Some(frame.seq) {
            self.handle_login_response(&name, &frame.payload).await;
            return;
        }

        match codec::decode(&self.registry, &name, &frame.payload) {
            Ok(value) => {
                if name == msg::KEEPALIVE_ACK {
                    self.missed_beats = 0;
                    return;
                }
                match self.pending.take(frame.seq) {
                    Some(entry) => {
                        if entry.name != name {
                            debug!(request = %entry.name, response = %name, "response type differs from request");
                        }
                        self.cache.apply(&name, &value);
                        let _ = entry.reply.send(Ok(value));
                    }
                    None => {
                        // Unsolicited push
                        self.cache.apply(&name, &value);
                    }
                }
            }
            Err(error) => match self.pending.take(frame.seq) {
                Some(entry) => {
                    let _ = entry.reply.send(Err(error.into()));
                }
                None => {
                    warn!(message = %name, %error, "dropping undecodable push");
                }
            },
        }
    }

    async fn handle_login_response(&mut self, name: &str, payload: &[u8]) {
        self.login_seq = None;

        if name != msg::LOGIN_RESPONSE {
            warn!(message = name, "unexpected reply to login request");
            self.emit(SessionEvent::LoginFailed {
                reason: format!("unexpected {name} reply to login"),
            });
            self.shutdown(None).await;
            return;
        }

        match codec::decode(&self.registry, name, payload) {
            Ok(value) if value.get("ok").and_then(Value::as_bool) == Some(true) => {
                let farmer_id = value.get("farmer_id").and_then(Value::as_u64).unwrap_or(0);
                self.state = ConnState::Ready;
                info!(farmer_id, "login confirmed, session ready");
                self.emit(SessionEvent::LoginSucceeded { farmer_id });
            }
            Ok(value) => {
                let reason = value
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified")
                    .to_string();
                warn!(%reason, "login rejected by server");
                self.emit(SessionEvent::LoginFailed { reason });
                self.shutdown(None).await;
            }
            Err(error) => {
                warn!(%error, "login response was undecodable");
                self.emit(SessionEvent::LoginFailed {
                    reason: error.to_string(),
                });
                self.shutdown(None).await;
            }
        }
    }

    /// Losing the connection before login resolves is a login failure, not
    /// a mid-session drop
    async fn connection_lost(&mut self, reason: DisconnectReason) {
        if self.state == ConnState::Authenticating {
            self.emit(SessionEvent::LoginFailed {
                reason: reason.to_string(),
            });
            self.shutdown(None).await;
        } else {
            self.shutdown(Some(reason)).await;
        }
    }

    async fn heartbeat_tick(&mut self) {
        if self.missed_beats >= MAX_MISSED_BEATS {
            warn!(missed = self.missed_beats, "heartbeat acknowledgements lost");
            self.shutdown(Some(DisconnectReason::HeartbeatLost)).await;
            return;
        }

        let seq = self.next_seq();
        match self.transmit(msg::KEEPALIVE, seq, &json!({})).await {
            Ok(()) => {
                self.missed_beats += 1;
                debug!(seq, outstanding = self.missed_beats, "keepalive sent");
            }
            Err(error) => {
                warn!(%error, "keepalive transmit failed");
                self.shutdown(Some(DisconnectReason::Io(error.to_string()))).await;
            }
        }
    }

    fn sweep_timeouts(&mut self) {
        for entry in self.pending.take_expired(Instant::now()) {
            debug!(message = %entry.name, "request timed out");
            let _ = entry.reply.send(Err(SessionError::RequestTimeout));
        }
    }

    /// Scoped release: reject pending, close the socket, announce once
    ///
    /// `reason` is `Some` only for involuntary closures; a deliberate local
    /// close stays silent. Re-entry is a no-op, so `close()` is idempotent.
    async fn shutdown(&mut self, reason: Option<DisconnectReason>) {
        if matches!(self.state, ConnState::Closing | ConnState::Closed) {
            return;
        }
        self.state = ConnState::Closing;

        for entry in self.pending.drain() {
            let _ = entry.reply.send(Err(SessionError::SessionClosed));
        }
        let _ = self.writer.shutdown().await;
        self.state = ConnState::Closed;

        match reason {
            Some(reason) => {
                info!(%reason, "session disconnected");
                self.emit(SessionEvent::Disconnected { reason });
            }
            None => debug!("session closed"),
        }
    }
}
