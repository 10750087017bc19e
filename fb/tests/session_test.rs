//! Session engine integration tests
//!
//! Every test runs a real session core against the scripted fake backend
//! from `common`: real frames, real codec, in-memory duplex transport.

mod common;

use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use common::{
    Out, Reply, default_rules, next_event, request_log, respond, rig, rig_with, test_session_config, wait_ready,
};
use farmbot::session::{ConnState, DisconnectReason, SessionError, SessionEvent};
use gameproto::msg;

#[tokio::test]
async fn test_login_success_emits_event_and_reaches_ready() {
    let mut rig = rig(|request| default_rules(request).unwrap_or(Reply::Ignore)).await;

    match next_event(&mut rig).await {
        SessionEvent::LoginSucceeded { farmer_id } => assert_eq!(farmer_id, 7),
        other => panic!("expected LoginSucceeded, got {other:?}"),
    }
    assert_eq!(rig.session.state().await, ConnState::Ready);
}

#[tokio::test]
async fn test_login_rejection_emits_failure_and_closes() {
    let mut rig = rig(|request| match request.name.as_str() {
        msg::LOGIN_REQUEST => respond(msg::LOGIN_RESPONSE, json!({ "ok": false, "reason": "code expired" })),
        _ => Reply::Ignore,
    })
    .await;

    match next_event(&mut rig).await {
        SessionEvent::LoginFailed { reason } => assert_eq!(reason, "code expired"),
        other => panic!("expected LoginFailed, got {other:?}"),
    }

    // Authentication rejection is not a disconnect; no further event follows
    assert!(timeout(Duration::from_millis(200), rig.events.recv()).await.is_err());

    let err = rig.session.request(msg::FARM_STATE_REQUEST, json!({})).await.unwrap_err();
    assert!(matches!(err, SessionError::SessionClosed | SessionError::NotReady(_)));
}

#[tokio::test]
async fn test_request_before_ready_fails_fast_without_transmitting() {
    let log = request_log();
    let server_log = log.clone();
    let rig = rig(move |request| {
        server_log.lock().unwrap().push(request.clone());
        // Never answer the login, so the session stays in Authenticating
        Reply::Ignore
    })
    .await;

    let err = rig.session.request(msg::FARM_STATE_REQUEST, json!({})).await.unwrap_err();
    assert!(matches!(err, SessionError::NotReady(ConnState::Authenticating)));

    // Only the login request ever hit the wire
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(common::logged_names(&log), vec![msg::LOGIN_REQUEST.to_string()]);
}

#[tokio::test]
async fn test_out_of_order_responses_resolve_their_own_requests() {
    let farm_seq = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let server_seq = farm_seq.clone();
    let mut rig = rig(move |request| match request.name.as_str() {
        msg::FARM_STATE_REQUEST => {
            // Hold the first answer until the second request arrives
            server_seq.store(request.seq, std::sync::atomic::Ordering::SeqCst);
            Reply::Ignore
        }
        msg::TASK_LIST_REQUEST => Reply::Send(vec![
            Out::Respond {
                name: msg::TASK_LIST_RESPONSE,
                value: json!({ "tasks": [] }),
            },
            Out::Frame {
                name: msg::FARM_STATE_RESPONSE,
                seq: server_seq.load(std::sync::atomic::Ordering::SeqCst),
                value: json!({ "plots": [] }),
            },
        ]),
        _ => default_rules(request).unwrap_or(Reply::Ignore),
    })
    .await;
    wait_ready(&mut rig).await;

    let farm = rig.session.request(msg::FARM_STATE_REQUEST, json!({}));
    let tasks = rig.session.request(msg::TASK_LIST_REQUEST, json!({}));
    let (farm, tasks) = tokio::join!(farm, tasks);

    // Each handle got the payload for its own request, despite the swap
    assert!(farm.unwrap().get("plots").is_some());
    assert!(tasks.unwrap().get("tasks").is_some());
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let mut rig = rig(|request| default_rules(request).unwrap_or(Reply::Ignore)).await;
    wait_ready(&mut rig).await;

    let start = tokio::time::Instant::now();
    let err = rig.session.request(msg::FARM_STATE_REQUEST, json!({})).await.unwrap_err();
    assert!(matches!(err, SessionError::RequestTimeout));
    // Bounded by the configured deadline, not hanging forever
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_close_rejects_pending_and_is_idempotent() {
    let mut rig = rig(|request| default_rules(request).unwrap_or(Reply::Ignore)).await;
    wait_ready(&mut rig).await;

    let session = rig.session.clone();
    let pending = tokio::spawn(async move { session.request(msg::FARM_STATE_REQUEST, json!({})).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    rig.session.close().await;

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::SessionClosed));

    // Close again; nothing explodes and the state stays Closed
    rig.session.close().await;
    rig.session.close().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(rig.session.state().await, ConnState::Closed);

    // A deliberate close is not a disconnect
    assert!(timeout(Duration::from_millis(200), rig.events.recv()).await.is_err());
}

#[tokio::test]
async fn test_three_missed_heartbeats_disconnect_exactly_once() {
    let mut config = test_session_config();
    config.heartbeat_interval = Duration::from_millis(50);

    let mut rig = rig_with(config, |request| match request.name.as_str() {
        msg::LOGIN_REQUEST => respond(msg::LOGIN_RESPONSE, json!({ "ok": true, "farmer_id": 7 })),
        // Keepalives vanish into the void
        _ => Reply::Ignore,
    })
    .await;
    wait_ready(&mut rig).await;

    match next_event(&mut rig).await {
        SessionEvent::Disconnected { reason } => assert_eq!(reason, DisconnectReason::HeartbeatLost),
        other => panic!("expected Disconnected, got {other:?}"),
    }

    // Exactly once: the stream stays silent afterwards
    assert!(timeout(Duration::from_millis(300), rig.events.recv()).await.is_err());
    assert_eq!(rig.session.state().await, ConnState::Closed);
}

#[tokio::test]
async fn test_acknowledged_heartbeats_keep_the_session_alive() {
    let mut config = test_session_config();
    config.heartbeat_interval = Duration::from_millis(50);

    let mut rig = rig_with(config, |request| default_rules(request).unwrap_or(Reply::Ignore)).await;
    wait_ready(&mut rig).await;

    // Long enough for several beats; acks keep resetting the miss counter
    assert!(timeout(Duration::from_millis(400), rig.events.recv()).await.is_err());
    assert_eq!(rig.session.state().await, ConnState::Ready);
}

#[tokio::test]
async fn test_unknown_message_type_is_dropped_not_fatal() {
    let mut rig = rig(|request| match request.name.as_str() {
        msg::FARM_STATE_REQUEST => Reply::Send(vec![
            // Nonsense type id first, then the real response
            Out::Raw {
                wire_id: 0xBEEF,
                seq: Some(0),
                payload: vec![1, 2, 3],
            },
            Out::Respond {
                name: msg::FARM_STATE_RESPONSE,
                value: json!({ "plots": [] }),
            },
        ]),
        other => default_rules(request).unwrap_or_else(|| panic!("unexpected request {other}")),
    })
    .await;
    wait_ready(&mut rig).await;

    let response = rig.session.request(msg::FARM_STATE_REQUEST, json!({})).await.unwrap();
    assert!(response.get("plots").is_some());
    assert_eq!(rig.session.state().await, ConnState::Ready);
}

#[tokio::test]
async fn test_undecodable_response_fails_that_request_only() {
    let mut rig = rig(|request| match request.name.as_str() {
        msg::FARM_STATE_REQUEST => Reply::Send(vec![Out::Raw {
            wire_id: 11, // FarmStateResponse with a truncated payload
            seq: None,
            payload: vec![1, 2],
        }]),
        _ => default_rules(request).unwrap_or(Reply::Ignore),
    })
    .await;
    wait_ready(&mut rig).await;

    let err = rig.session.request(msg::FARM_STATE_REQUEST, json!({})).await.unwrap_err();
    assert!(matches!(err, SessionError::Decode(_)));
    // The session itself survives
    assert_eq!(rig.session.state().await, ConnState::Ready);
}

#[tokio::test]
async fn test_push_updates_cache() {
    let mut rig = rig(|request| match request.name.as_str() {
        msg::FARM_STATE_REQUEST => Reply::Send(vec![
            Out::Respond {
                name: msg::FARM_STATE_RESPONSE,
                value: json!({ "plots": [ { "index": 0, "stage": 1 } ] }),
            },
            // Unsolicited push right behind the response
            Out::Frame {
                name: msg::PLOT_PUSH,
                seq: 0,
                value: json!({ "plot": { "index": 0, "stage": 2 } }),
            },
        ]),
        _ => default_rules(request).unwrap_or(Reply::Ignore),
    })
    .await;
    wait_ready(&mut rig).await;

    rig.session.request(msg::FARM_STATE_REQUEST, json!({})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let plots = rig.cache.plots();
    assert_eq!(plots.len(), 1);
    assert_eq!(plots[0].stage, farmbot::domain::GrowthStage::Mature);
}

#[tokio::test]
async fn test_server_hangup_emits_disconnected() {
    let mut rig = rig(|request| match request.name.as_str() {
        msg::LOGIN_REQUEST => respond(msg::LOGIN_RESPONSE, json!({ "ok": true, "farmer_id": 7 })),
        _ => Reply::Hangup,
    })
    .await;
    wait_ready(&mut rig).await;

    // Poke the server so it hangs up
    let _ = rig.session.request(msg::FARM_STATE_REQUEST, json!({})).await;

    match next_event(&mut rig).await {
        SessionEvent::Disconnected { reason } => assert_eq!(reason, DisconnectReason::PeerClosed),
        other => panic!("expected Disconnected, got {other:?}"),
    }
}
