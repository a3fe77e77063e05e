// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the outbound dispatch pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use courier_core::{
    CourierError, Direction, Message, MessageKind, MessagePatch, MessageRepository, MessageStatus,
    NewMessage, OpaqueFailure, SendRequest, SessionState, TransportEvent, UserId,
};
use courier_dispatch::{Dispatcher, ReceiptListener, Repositories, StatusReconciler};
use courier_test_utils::{InMemoryStore, MockBehavior, MockMediaFetcher, TestHarness};
use serde_json::json;

const PHONE: &str = "15551234567";

async fn ready_harness(behavior: MockBehavior) -> TestHarness {
    let harness = TestHarness::builder().with_behavior(behavior).build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();
    harness
}

fn assert_nothing_pending(harness: &TestHarness) {
    assert_eq!(harness.store.count_with_status(MessageStatus::Pending), 0);
}

#[tokio::test]
async fn text_to_contact_with_ready_session_is_sent() {
    let harness = ready_harness(MockBehavior::default()).await;
    let contact = harness.store.insert_contact("u1", PHONE, Some("Ada"));

    let message = harness
        .send("u1", SendRequest::text_to_contact(&contact.id, "hi"))
        .await
        .unwrap();

    assert_eq!(message.status, MessageStatus::Sent);
    assert!(message.external_id.is_some());
    assert_eq!(message.direction, Direction::Outgoing);
    assert_eq!(message.kind, MessageKind::Text);
    assert_eq!(message.contact_id, contact.id);

    let sent = harness.factory.last().unwrap().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, format!("{PHONE}@c.us"));
    assert_eq!(sent[0].text.as_deref(), Some("hi"));
    assert_eq!(message.external_id.as_deref(), Some(sent[0].external_id.as_str()));
}

#[tokio::test]
async fn empty_content_without_media_is_rejected_before_persisting() {
    let harness = ready_harness(MockBehavior::default()).await;

    let err = harness
        .send("u1", SendRequest::text_to_address(PHONE, ""))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(harness.store.messages().is_empty());
    assert_eq!(harness.store.contact_count(), 0);
}

#[tokio::test]
async fn oversized_content_cites_the_limit() {
    let harness = ready_harness(MockBehavior::default()).await;

    let err = harness
        .send("u1", SendRequest::text_to_address(PHONE, "a".repeat(5000)))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("4096"), "got: {err}");
    assert!(harness.store.messages().is_empty());
}

#[tokio::test]
async fn content_at_the_limit_is_accepted() {
    let harness = ready_harness(MockBehavior::default()).await;
    let message = harness
        .send("u1", SendRequest::text_to_address(PHONE, "é".repeat(4096)))
        .await
        .unwrap();
    assert_eq!(message.status, MessageStatus::Sent);
}

#[tokio::test]
async fn blank_user_id_is_rejected() {
    let harness = ready_harness(MockBehavior::default()).await;
    let err = harness
        .send("  ", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn short_address_names_raw_and_normalized_values() {
    let harness = ready_harness(MockBehavior::default()).await;
    let err = harness
        .send("u1", SendRequest::text_to_address("+1 (555) 12", "hi"))
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(err.is_validation());
    assert!(msg.contains("+1 (555) 12"), "got: {msg}");
    assert!(msg.contains("155512"), "got: {msg}");
    assert!(harness.store.messages().is_empty());
}

#[tokio::test]
async fn missing_recipient_is_rejected() {
    let harness = ready_harness(MockBehavior::default()).await;
    let request = SendRequest {
        content: Some("hi".into()),
        ..SendRequest::default()
    };
    let err = harness.send("u1", request).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn contact_of_another_user_is_not_found() {
    let harness = ready_harness(MockBehavior::default()).await;
    let theirs = harness.store.insert_contact("u2", PHONE, None);
    let err = harness
        .send("u1", SendRequest::text_to_contact(&theirs.id, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::NotFound { entity: "contact", .. }));
    assert!(harness.store.messages().is_empty());
}

#[tokio::test]
async fn raw_address_creates_contact_once() {
    let harness = ready_harness(MockBehavior::default()).await;
    let a = harness
        .send("u1", SendRequest::text_to_address("+1 555-123-4567", "one"))
        .await
        .unwrap();
    let b = harness
        .send("u1", SendRequest::text_to_address("15551234567@c.us", "two"))
        .await
        .unwrap();
    assert_eq!(a.contact_id, b.contact_id);
    assert_eq!(a.conversation_id, b.conversation_id);
    assert_eq!(harness.store.contact_count(), 1);
}

#[tokio::test]
async fn no_connected_session_fails_and_marks_row_failed() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior::awaiting_scan("qr"))
        .build();
    harness
        .connect("u1", "s1", SessionState::QrReady)
        .await
        .unwrap();

    let err = harness
        .send("u1", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(err.is_validation());
    assert!(msg.contains("not connected"), "got: {msg}");
    assert!(msg.contains("s1=QR_READY"), "got: {msg}");
    assert_eq!(harness.store.count_with_status(MessageStatus::Failed), 1);
    assert_nothing_pending(&harness);
}

#[tokio::test]
async fn user_without_sessions_fails_with_validation() {
    let harness = TestHarness::builder().build();
    let err = harness
        .send("u1", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("no sessions"));
    assert_nothing_pending(&harness);
}

#[tokio::test]
async fn authenticated_session_can_send() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior {
            init_events: vec![TransportEvent::Authenticated],
            ..MockBehavior::default()
        })
        .build();
    harness
        .connect("u1", "s1", SessionState::Authenticated)
        .await
        .unwrap();

    let message = harness
        .send("u1", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap();
    assert_eq!(message.status, MessageStatus::Sent);
}

#[tokio::test]
async fn ready_session_is_preferred_over_authenticated() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior {
            init_events: vec![TransportEvent::Authenticated],
            ..MockBehavior::default()
        })
        .build();
    harness
        .connect("u1", "s1", SessionState::Authenticated)
        .await
        .unwrap();
    let authenticated_only = harness.factory.last().unwrap();

    harness.factory.set_behavior(MockBehavior::default());
    harness
        .connect("u1", "s2", SessionState::Ready)
        .await
        .unwrap();
    let ready = harness.factory.last().unwrap();

    harness
        .send("u1", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap();
    assert!(authenticated_only.sent().is_empty());
    assert_eq!(ready.sent().len(), 1);
}

#[tokio::test]
async fn degraded_transport_state_is_reported() {
    let harness = ready_harness(MockBehavior {
        connection_state: Some("OPENING".into()),
        ..MockBehavior::default()
    })
    .await;

    let err = harness
        .send("u1", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("OPENING"), "got: {err}");
    assert_eq!(harness.store.count_with_status(MessageStatus::Failed), 1);
}

#[tokio::test]
async fn unregistered_destination_is_rejected() {
    let harness = ready_harness(MockBehavior {
        registered: false,
        ..MockBehavior::default()
    })
    .await;

    let err = harness
        .send("u1", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains(PHONE));
    assert_eq!(harness.store.count_with_status(MessageStatus::Failed), 1);
    assert!(harness.factory.last().unwrap().sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hanging_send_times_out_and_marks_failed() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior {
            hang_send: true,
            ..MockBehavior::default()
        })
        .with_operation_timeout(Duration::from_millis(50))
        .build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();

    let err = harness
        .send("u1", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::ExternalService { .. }), "got: {err:?}");
    assert!(err.is_retryable());
    assert_eq!(harness.store.count_with_status(MessageStatus::Failed), 1);
    assert_nothing_pending(&harness);
}

#[tokio::test]
async fn shapeless_transport_failure_is_stringified() {
    let harness = ready_harness(MockBehavior {
        send_failure: Some(OpaqueFailure::from_value(json!({"error": {"message": "rate limited"}}))),
        ..MockBehavior::default()
    })
    .await;

    let err = harness
        .send("u1", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::ExternalService { .. }));
    assert!(err.to_string().contains("rate limited"), "got: {err}");

    let failed = harness.store.messages();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, MessageStatus::Failed);
    assert!(failed[0].external_id.is_none());
}

#[tokio::test]
async fn media_send_fetches_and_attaches_caption() {
    let harness = ready_harness(MockBehavior::default()).await;
    let request =
        SendRequest::text_to_address(PHONE, "your invoice").with_media("https://cdn.test/inv.pdf");

    let message = harness.send("u1", request).await.unwrap();

    assert_eq!(message.kind, MessageKind::Document);
    assert_eq!(message.status, MessageStatus::Sent);
    assert_eq!(harness.media.requested(), vec!["https://cdn.test/inv.pdf"]);
    let sent = harness.factory.last().unwrap().sent();
    assert_eq!(sent[0].text.as_deref(), Some("your invoice"));
    assert_eq!(
        sent[0].media.as_ref().map(|m| m.mime_type.as_str()),
        Some("application/pdf")
    );
}

#[tokio::test]
async fn media_only_send_is_allowed() {
    let harness = ready_harness(MockBehavior::default()).await;
    let request = SendRequest {
        address: Some(PHONE.into()),
        media_url: Some("https://cdn.test/a.pdf".into()),
        ..SendRequest::default()
    };
    let message = harness.send("u1", request).await.unwrap();
    assert_eq!(message.content, None);
    assert_eq!(harness.factory.last().unwrap().sent()[0].text, None);
}

#[tokio::test]
async fn media_fetch_failure_marks_failed() {
    let harness = TestHarness::builder()
        .with_media(MockMediaFetcher::failing("HTTP 404"))
        .build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();

    let request = SendRequest::text_to_address(PHONE, "doc").with_media("https://cdn.test/missing");
    let err = harness.send("u1", request).await.unwrap_err();

    assert!(matches!(err, CourierError::ExternalService { .. }));
    assert!(err.to_string().contains("HTTP 404"));
    assert_eq!(harness.store.count_with_status(MessageStatus::Failed), 1);
    assert!(harness.factory.last().unwrap().sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn caller_giving_up_does_not_leave_row_pending() {
    let harness = TestHarness::builder()
        .with_behavior(MockBehavior {
            hang_send: true,
            ..MockBehavior::default()
        })
        .with_operation_timeout(Duration::from_secs(30))
        .build();
    harness
        .connect("u1", "s1", SessionState::Ready)
        .await
        .unwrap();

    let gave_up = tokio::time::timeout(
        Duration::from_secs(1),
        harness.send("u1", SendRequest::text_to_address(PHONE, "hi")),
    )
    .await;
    assert!(gave_up.is_err());
    assert_eq!(harness.store.count_with_status(MessageStatus::Pending), 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(harness.store.count_with_status(MessageStatus::Failed), 1);
    assert_nothing_pending(&harness);
}

#[tokio::test(start_paused = true)]
async fn ack_arriving_before_send_returns_is_applied() {
    let harness = ready_harness(MockBehavior {
        ack_on_send: Some(MessageStatus::Delivered),
        ..MockBehavior::default()
    })
    .await;
    let listener = ReceiptListener::spawn(&harness.bus, harness.reconciler.clone());

    let message = harness
        .send("u1", SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap();

    assert_eq!(message.status, MessageStatus::Delivered);
    assert!(message.delivered_at.is_some());
    let stored = harness.store.message(&message.id).unwrap();
    assert_eq!(stored.status, MessageStatus::Delivered);
    assert_eq!(stored.external_id, message.external_id);
    listener.stop().await;
}

/// Message store whose `SENT` writes fail.
struct SentWriteFails(Arc<InMemoryStore>);

#[async_trait]
impl MessageRepository for SentWriteFails {
    async fn create(&self, fields: NewMessage) -> Result<Message, CourierError> {
        self.0.create(fields).await
    }

    async fn update(&self, id: &str, patch: MessagePatch) -> Result<Message, CourierError> {
        if patch.status == Some(MessageStatus::Sent) {
            return Err(CourierError::Internal("disk full".into()));
        }
        self.0.update(id, patch).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Message>, CourierError> {
        self.0.find_by_id(id).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Message>, CourierError> {
        self.0.find_by_external_id(external_id).await
    }
}

#[tokio::test]
async fn failure_to_record_a_delivered_send_is_surfaced() {
    let harness = ready_harness(MockBehavior::default()).await;
    let messages = Arc::new(SentWriteFails(harness.store.clone()));
    let dispatcher = Dispatcher::new(
        harness.registry.clone(),
        Repositories {
            contacts: harness.store.clone(),
            conversations: harness.store.clone(),
            messages: messages.clone(),
        },
        harness.media.clone(),
        Arc::new(StatusReconciler::new(messages)),
        Default::default(),
    );

    let err = dispatcher
        .send(&UserId::from("u1"), SendRequest::text_to_address(PHONE, "hi"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("disk full"), "got: {err}");
    assert_eq!(harness.factory.last().unwrap().sent().len(), 1);
}
