//! Shared fixtures: a scripted fake backend over an in-memory duplex stream
//!
//! Tests drive a real session (real framing, real codec, real core task)
//! against a server task whose behavior is a closure from decoded request to
//! reply script.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gameproto::{Frame, MAX_FRAME_BYTES, SchemaRegistry, codec, msg, read_frame, write_frame};
use serde_json::{Value, json};
use tokio::io::DuplexStream;
use tokio::sync::broadcast;
use tokio::time::timeout;

use farmbot::config::Config;
use farmbot::credential::{Credential, Platform};
use farmbot::session::{Session, SessionConfig, SessionEvent};
use farmbot::state::StateCache;

/// A decoded request as the fake server saw it
#[derive(Debug, Clone)]
pub struct ServerFrame {
    pub name: String,
    pub seq: u32,
    pub value: Value,
}

/// One outbound frame in a reply script
#[derive(Debug, Clone)]
pub enum Out {
    /// Respond on the current request's sequence id
    Respond { name: &'static str, value: Value },

    /// Send on an explicit sequence id (out-of-order replies, pushes use 0)
    Frame { name: &'static str, seq: u32, value: Value },

    /// Send raw bytes; `seq: None` echoes the current request's id
    Raw {
        wire_id: u16,
        seq: Option<u32>,
        payload: Vec<u8>,
    },
}

/// What the handler wants done with a request
#[derive(Debug, Clone)]
pub enum Reply {
    Send(Vec<Out>),
    Ignore,
    Hangup,
}

/// Respond to the current request with one message
pub fn respond(name: &'static str, value: Value) -> Reply {
    Reply::Send(vec![Out::Respond { name, value }])
}

/// Accept any login and ack any keepalive; `None` for everything else
pub fn default_rules(request: &ServerFrame) -> Option<Reply> {
    match request.name.as_str() {
        msg::LOGIN_REQUEST => Some(respond(msg::LOGIN_RESPONSE, json!({ "ok": true, "farmer_id": 7 }))),
        msg::KEEPALIVE => Some(respond(msg::KEEPALIVE_ACK, json!({}))),
        _ => None,
    }
}

async fn serve<H>(stream: DuplexStream, registry: Arc<SchemaRegistry>, mut handler: H)
where
    H: FnMut(&ServerFrame) -> Reply + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    loop {
        let frame = match read_frame(&mut reader, MAX_FRAME_BYTES).await {
            Ok(Some(frame)) => frame,
            _ => break,
        };
        let descriptor = registry.describe_id(frame.wire_id).expect("client sent unknown type");
        let value = codec::decode(&registry, descriptor.name(), &frame.payload).expect("client sent undecodable frame");
        let request = ServerFrame {
            name: descriptor.name().to_string(),
            seq: frame.seq,
            value,
        };

        match handler(&request) {
            Reply::Send(outs) => {
                for out in outs {
                    let frame = match out {
                        Out::Respond { name, value } => encode_out(&registry, name, request.seq, &value),
                        Out::Frame { name, seq, value } => encode_out(&registry, name, seq, &value),
                        Out::Raw { wire_id, seq, payload } => Frame {
                            wire_id,
                            seq: seq.unwrap_or(request.seq),
                            payload,
                        },
                    };
                    write_frame(&mut writer, &frame, MAX_FRAME_BYTES).await.expect("server write");
                }
            }
            Reply::Ignore => {}
            Reply::Hangup => break,
        }
    }
}

fn encode_out(registry: &SchemaRegistry, name: &'static str, seq: u32, value: &Value) -> Frame {
    let payload = codec::encode(registry, name, value).expect("server-side encode");
    Frame {
        wire_id: registry.wire_id(name).expect("server-side wire id"),
        seq,
        payload,
    }
}

/// Running session + fake server pair
pub struct Rig {
    pub session: Session,
    pub events: broadcast::Receiver<SessionEvent>,
    pub cache: Arc<StateCache>,
}

pub fn test_credential() -> Credential {
    Credential {
        code: "test-code".to_string(),
        platform: Platform::Android,
    }
}

/// Short timeouts, long heartbeat: heartbeat stays out of the way unless a
/// test opts in with its own config
pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        request_timeout: Duration::from_millis(300),
        heartbeat_interval: Duration::from_secs(60),
        pending_capacity: 8,
        client_version: "test".to_string(),
    }
}

/// Zero pacing so loop tests run at full speed
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.pacing.base_ms = 0;
    config.pacing.jitter_ms = 0;
    config
}

pub async fn rig<H>(handler: H) -> Rig
where
    H: FnMut(&ServerFrame) -> Reply + Send + 'static,
{
    rig_with(test_session_config(), handler).await
}

pub async fn rig_with<H>(config: SessionConfig, handler: H) -> Rig
where
    H: FnMut(&ServerFrame) -> Reply + Send + 'static,
{
    let registry = Arc::new(gameproto::default_registry().expect("embedded catalogue"));
    let cache = Arc::new(StateCache::default());
    let (client, server) = tokio::io::duplex(64 * 1024);

    tokio::spawn(serve(server, Arc::clone(&registry), handler));
    let (session, events) = Session::spawn(client, config, registry, Arc::clone(&cache), test_credential());

    Rig { session, events, cache }
}

/// A log of requests the server handled, shared with the test body
pub type RequestLog = Arc<Mutex<Vec<ServerFrame>>>;

pub fn request_log() -> RequestLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn logged_names(log: &RequestLog) -> Vec<String> {
    log.lock().unwrap().iter().map(|frame| frame.name.clone()).collect()
}

/// Wait for the next session event, failing the test on silence
pub async fn next_event(rig: &mut Rig) -> SessionEvent {
    timeout(Duration::from_secs(2), rig.events.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event stream closed")
}

/// Wait until login has succeeded
pub async fn wait_ready(rig: &mut Rig) {
    match next_event(rig).await {
        SessionEvent::LoginSucceeded { .. } => {}
        other => panic!("expected LoginSucceeded, got {other:?}"),
    }
}
