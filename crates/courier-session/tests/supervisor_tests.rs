// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for session bring-up, supervision, and teardown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use courier_bus::{BusEvent, BusReceiver, LifecycleDetail};
use courier_config::SessionConfig;
use courier_core::{
    CourierError, InboundMessage, MessageStatus, OpaqueFailure, SessionId, SessionState,
    TransportEvent, UserId,
};
use courier_test_utils::{MockBehavior, TestHarness, wait_for_state};
use tokio::task::JoinSet;

fn sid(s: &str) -> SessionId {
    SessionId::from(s)
}

fn uid(s: &str) -> UserId {
    UserId::from(s)
}

fn slow_init(delay: Duration) -> MockBehavior {
    MockBehavior {
        init_delay: delay,
        ..MockBehavior::default()
    }
}

/// Drains lifecycle events until none arrives for 100ms.
async fn lifecycle_events(rx: &mut BusReceiver) -> Vec<(SessionState, LifecycleDetail)> {
    let mut out = Vec::new();
    while let Ok(Some(envelope)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await
    {
        if let BusEvent::Lifecycle(e) = envelope.event {
            out.push((e.state, e.detail));
        }
    }
    out
}

#[tokio::test(start_paused = true)]
async fn concurrent_bring_up_constructs_one_transport() {
    let harness = TestHarness::builder()
        .with_behavior(slow_init(Duration::from_millis(500)))
        .build();

    let mut callers = JoinSet::new();
    for _ in 0..8 {
        let supervisor = harness.supervisor.clone();
        callers.spawn(async move { supervisor.bring_up(&uid("u1"), &sid("s1")).await });
    }

    let mut sessions = Vec::new();
    while let Some(joined) = callers.join_next().await {
        sessions.push(joined.unwrap().unwrap());
    }

    assert_eq!(harness.factory.constructed_for(&sid("s1")), 1);
    let first = &sessions[0];
    assert!(sessions.iter().all(|s| Arc::ptr_eq(s, first)));

    wait_for_state(first, SessionState::Ready, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(harness.supervisor.status(&sid("s1")).unwrap().state, SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn two_concurrent_bring_ups_share_id_and_final_state() {
    let harness = TestHarness::builder()
        .with_behavior(slow_init(Duration::from_secs(2)))
        .build();

    let (user, session) = (uid("u1"), sid("s1"));
    let (a, b) = tokio::join!(
        harness.supervisor.bring_up(&user, &session),
        harness.supervisor.bring_up(&user, &session),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id(), b.id());
    assert!(Arc::ptr_eq(&a, &b));
    wait_for_state(&a, SessionState::Ready, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(a.state(), b.state());
    assert_eq!(harness.factory.constructed(), 1);
}

#[tokio::test]
async fn awaiting_scan_exposes_qr_payload() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior::awaiting_scan("2@pair-me"))
        .build();
    let mut rx = harness.bus.subscribe();

    let session = harness
        .connect("u1", "s1", SessionState::QrReady)
        .await
        .unwrap();
    let status = session.status();
    assert_eq!(status.qr_payload.as_deref(), Some("2@pair-me"));
    assert!(!harness.registry.is_initializing(&sid("s1")));

    let events = lifecycle_events(&mut rx).await;
    assert_eq!(
        events,
        vec![
            (SessionState::Initializing, LifecycleDetail::None),
            (
                SessionState::QrReady,
                LifecycleDetail::QrCode {
                    payload: "2@pair-me".into()
                }
            ),
        ]
    );
}

#[tokio::test]
async fn scan_accepted_moves_to_ready_and_clears_qr() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior::awaiting_scan("qr-1"))
        .build();
    let session = harness
        .connect("u1", "s1", SessionState::QrReady)
        .await
        .unwrap();
    let transport = harness.factory.last().unwrap();

    transport.emit(TransportEvent::Qr("qr-2".into())).await;
    transport.emit(TransportEvent::Authenticated).await;
    transport
        .emit(TransportEvent::Ready {
            address: "15557654321".into(),
        })
        .await;

    wait_for_state(&session, SessionState::Ready, Duration::from_secs(1))
        .await
        .unwrap();
    let status = session.status();
    assert_eq!(status.qr_payload, None);
    assert_eq!(status.address.as_deref(), Some("15557654321"));
}

#[tokio::test]
async fn initialization_failure_disconnects_and_clears_marker() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior {
            init_failure: Some(OpaqueFailure::from_value(
                serde_json::json!({"message": "browser crashed"}),
            )),
            ..MockBehavior::default()
        })
        .build();

    let err = harness
        .supervisor
        .bring_up(&uid("u1"), &sid("s1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::ExternalService { .. }));
    assert!(err.to_string().contains("browser crashed"), "got: {err}");

    assert!(harness.registry.get(&sid("s1")).is_none());
    assert!(!harness.registry.is_initializing(&sid("s1")));
    assert!(harness.factory.last().unwrap().is_destroyed());

    // A fresh attempt is not blocked by the failed one.
    harness.factory.set_behavior(MockBehavior::default());
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();
    assert_eq!(harness.factory.constructed(), 2);
}

#[tokio::test(start_paused = true)]
async fn hanging_initialization_times_out() {
    let harness = TestHarness::builder()
        .with_behavior(slow_init(Duration::from_secs(3600)))
        .with_session_config(SessionConfig {
            init_timeout_ms: 1_000,
            ..SessionConfig::default()
        })
        .build();

    let err = harness
        .supervisor
        .bring_up(&uid("u1"), &sid("s1"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("transport initialization"), "got: {err}");
    assert!(harness.registry.is_empty());
    assert!(harness.factory.last().unwrap().is_destroyed());
}

#[tokio::test(start_paused = true)]
async fn race_loser_gives_up_with_init_in_progress() {
    let harness = TestHarness::builder()
        .with_behavior(slow_init(Duration::from_secs(60)))
        .with_session_config(SessionConfig {
            init_timeout_ms: 120_000,
            init_wait_attempts: 10,
            init_wait_interval_ms: 100,
            ..SessionConfig::default()
        })
        .build();

    let winner = {
        let supervisor = harness.supervisor.clone();
        tokio::spawn(async move { supervisor.bring_up(&uid("u1"), &sid("s1")).await })
    };
    tokio::task::yield_now().await;

    let err = harness
        .supervisor
        .bring_up(&uid("u1"), &sid("s1"))
        .await
        .unwrap_err();
    match err {
        CourierError::InitInProgress { session_id, waited } => {
            assert_eq!(session_id, "s1");
            assert_eq!(waited, Duration::from_secs(1));
        }
        other => panic!("expected InitInProgress, got {other:?}"),
    }

    winner.await.unwrap().unwrap();
    assert_eq!(harness.factory.constructed(), 1);
}

#[tokio::test]
async fn bring_up_of_another_users_session_is_rejected() {
    let harness = TestHarness::builder().build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();
    let err = harness
        .supervisor
        .bring_up(&uid("u2"), &sid("s1"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn destroy_logs_out_and_releases_transport() {
    let harness = TestHarness::builder().build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();
    let transport = harness.factory.last().unwrap();

    harness.supervisor.destroy(&sid("s1")).await.unwrap();

    assert!(transport.is_logged_out());
    assert!(transport.is_destroyed());
    assert!(harness.registry.get(&sid("s1")).is_none());
    assert!(matches!(
        harness.supervisor.status(&sid("s1")),
        Err(CourierError::NotFound { .. })
    ));
}

#[tokio::test]
async fn destroy_survives_failed_logout() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior {
            logout_failure: Some("page closed".into()),
            ..MockBehavior::default()
        })
        .build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();
    let transport = harness.factory.last().unwrap();

    harness.supervisor.destroy(&sid("s1")).await.unwrap();

    assert!(!transport.is_logged_out());
    assert!(transport.is_destroyed());
    assert!(harness.registry.is_empty());
}

#[tokio::test]
async fn destroy_of_unknown_session_is_not_found() {
    let harness = TestHarness::builder().build();
    let err = harness.supervisor.destroy(&sid("ghost")).await.unwrap_err();
    assert!(matches!(err, CourierError::NotFound { entity: "session", .. }));
}

#[tokio::test]
async fn restart_builds_a_fresh_transport_for_the_same_user() {
    let harness = TestHarness::builder().build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();
    let old = harness.factory.last().unwrap();

    let session = harness.supervisor.restart(&sid("s1")).await.unwrap();
    wait_for_state(&session, SessionState::Ready, Duration::from_secs(1))
        .await
        .unwrap();

    assert!(old.is_destroyed());
    assert_eq!(session.user_id(), &uid("u1"));
    assert_eq!(harness.factory.constructed_for(&sid("s1")), 2);
}

#[tokio::test]
async fn transport_disconnect_removes_session() {
    let harness = TestHarness::builder().build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();
    let mut rx = harness.bus.subscribe();
    let transport = harness.factory.last().unwrap();

    transport
        .emit(TransportEvent::Disconnected("NAVIGATION".into()))
        .await;

    let events = lifecycle_events(&mut rx).await;
    assert_eq!(
        events,
        vec![(
            SessionState::Disconnected,
            LifecycleDetail::Disconnected {
                reason: "NAVIGATION".into()
            }
        )]
    );
    assert!(harness.registry.get(&sid("s1")).is_none());
    assert!(transport.is_destroyed());
    assert!(!transport.is_logged_out());
}

#[tokio::test]
async fn auth_failure_is_reported_distinctly() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior::awaiting_scan("qr"))
        .build();
    harness
        .connect("u1", "s1", SessionState::QrReady)
        .await
        .unwrap();
    let mut rx = harness.bus.subscribe();

    harness
        .factory
        .last()
        .unwrap()
        .emit(TransportEvent::AuthFailure("bad credentials".into()))
        .await;

    let events = lifecycle_events(&mut rx).await;
    assert_eq!(
        events,
        vec![(
            SessionState::Disconnected,
            LifecycleDetail::AuthRejected {
                reason: "bad credentials".into()
            }
        )]
    );
    assert!(harness.registry.is_empty());
}

fn inbound(from: &str, is_status: bool) -> InboundMessage {
    InboundMessage {
        session_id: sid("s1"),
        external_id: format!("in-{from}"),
        from: from.to_string(),
        body: Some("hello".into()),
        has_media: false,
        is_status,
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn system_messages_are_filtered_before_republishing() {
    let harness = TestHarness::builder().build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let _sub = harness
        .bus
        .on_inbound_message(move |m| sink.lock().unwrap().push(m.from));

    let transport = harness.factory.last().unwrap();
    transport
        .emit(TransportEvent::Message(inbound("status@broadcast", false)))
        .await;
    transport
        .emit(TransportEvent::Message(inbound("123@broadcast", false)))
        .await;
    transport
        .emit(TransportEvent::Message(inbound("15551112222@c.us", true)))
        .await;
    transport
        .emit(TransportEvent::Message(inbound("15553334444@c.us", false)))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(*received.lock().unwrap(), vec!["15553334444@c.us".to_string()]);
}

#[tokio::test]
async fn acks_are_published_as_receipts() {
    let harness = TestHarness::builder().build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();

    let receipts = Arc::new(Mutex::new(Vec::new()));
    let sink = receipts.clone();
    let _sub = harness
        .bus
        .on_receipt(move |r| sink.lock().unwrap().push((r.external_id, r.status)));

    harness
        .factory
        .last()
        .unwrap()
        .emit(TransportEvent::Ack {
            external_id: "ext-9".into(),
            status: MessageStatus::Delivered,
        })
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        *receipts.lock().unwrap(),
        vec![("ext-9".to_string(), MessageStatus::Delivered)]
    );
}

#[tokio::test]
async fn shutdown_releases_without_logout() {
    let harness = TestHarness::builder().build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();
    harness
        .connect("u2", "s2", SessionState::Ready)
        .await
        .unwrap();

    harness.supervisor.shutdown().await;

    assert!(harness.registry.is_empty());
    for id in ["s1", "s2"] {
        assert_eq!(harness.factory.constructed_for(&sid(id)), 1);
    }
    let last = harness.factory.last().unwrap();
    assert!(last.is_destroyed());
    assert!(!last.is_logged_out());
}
