// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable mock transport for deterministic testing.
//!
//! `MockTransportFactory` counts constructions so tests can assert that a
//! session id never gets two transports. Each `MockTransport` records what
//! was sent and lets tests inject transport events.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    MediaPayload, MessageStatus, OpaqueFailure, SessionId, Transport, TransportEvent,
    TransportFactory,
};
use tokio::sync::mpsc;

/// Default address reported on `Ready`.
pub const MOCK_ADDRESS: &str = "15550000000";

/// How a mock transport behaves.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// How long `initialize` takes.
    pub init_delay: Duration,
    /// Events emitted during `initialize`, in order.
    pub init_events: Vec<TransportEvent>,
    /// Makes `initialize` fail after the delay.
    pub init_failure: Option<OpaqueFailure>,
    /// Returned by `connection_state`.
    pub connection_state: Option<String>,
    /// Returned by `is_registered`.
    pub registered: bool,
    /// Makes `send_text`/`send_media` never return.
    pub hang_send: bool,
    /// Makes `send_text`/`send_media` fail.
    pub send_failure: Option<OpaqueFailure>,
    /// Makes `logout` fail.
    pub logout_failure: Option<OpaqueFailure>,
    /// Acknowledges each send with this status before the send returns.
    pub ack_on_send: Option<MessageStatus>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            init_delay: Duration::ZERO,
            init_events: vec![
                TransportEvent::Authenticated,
                TransportEvent::Ready {
                    address: MOCK_ADDRESS.to_string(),
                },
            ],
            init_failure: None,
            connection_state: Some("CONNECTED".to_string()),
            registered: true,
            hang_send: false,
            send_failure: None,
            logout_failure: None,
            ack_on_send: None,
        }
    }
}

impl MockBehavior {
    /// A transport that stops at `QrReady` waiting for a scan.
    pub fn awaiting_scan(payload: &str) -> Self {
        Self {
            init_events: vec![TransportEvent::Qr(payload.to_string())],
            ..Self::default()
        }
    }
}

/// A message captured by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: String,
    pub text: Option<String>,
    pub media: Option<MediaPayload>,
    pub external_id: String,
}

pub struct MockTransport {
    session_id: SessionId,
    behavior: MockBehavior,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    sent: Mutex<Vec<SentMessage>>,
    next_id: AtomicUsize,
    logged_out: AtomicBool,
    destroyed: AtomicBool,
}

impl MockTransport {
    pub fn new(
        session_id: SessionId,
        behavior: MockBehavior,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            session_id,
            behavior,
            events: Mutex::new(Some(events)),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            logged_out: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Injects an event as if the automation client fired it.
    ///
    /// Returns `false` once the transport is destroyed or the supervisor
    /// stopped listening.
    pub async fn emit(&self, event: TransportEvent) -> bool {
        let sender = self.events.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    async fn record_send(
        &self,
        chat_id: &str,
        text: Option<&str>,
        media: Option<MediaPayload>,
    ) -> Result<String, OpaqueFailure> {
        if self.behavior.hang_send {
            std::future::pending::<()>().await;
        }
        if let Some(failure) = &self.behavior.send_failure {
            return Err(failure.clone());
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let external_id = format!("mock-{}-{n}", self.session_id);
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(SentMessage {
            chat_id: chat_id.to_string(),
            text: text.map(String::from),
            media,
            external_id: external_id.clone(),
        });
        if let Some(status) = self.behavior.ack_on_send {
            self.emit(TransportEvent::Ack {
                external_id: external_id.clone(),
                status,
            })
            .await;
            // Give the receipt time to travel before the send returns.
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(external_id)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn initialize(&self) -> Result<(), OpaqueFailure> {
        if !self.behavior.init_delay.is_zero() {
            tokio::time::sleep(self.behavior.init_delay).await;
        }
        if let Some(failure) = &self.behavior.init_failure {
            return Err(failure.clone());
        }
        for event in self.behavior.init_events.clone() {
            self.emit(event).await;
        }
        Ok(())
    }

    async fn connection_state(&self) -> Result<Option<String>, OpaqueFailure> {
        Ok(self.behavior.connection_state.clone())
    }

    async fn is_registered(&self, _chat_id: &str) -> Result<bool, OpaqueFailure> {
        Ok(self.behavior.registered)
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<String, OpaqueFailure> {
        self.record_send(chat_id, Some(text), None).await
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<String, OpaqueFailure> {
        self.record_send(chat_id, caption, Some(media)).await
    }

    async fn logout(&self) -> Result<(), OpaqueFailure> {
        if let Some(failure) = &self.behavior.logout_failure {
            return Err(failure.clone());
        }
        self.logged_out.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), OpaqueFailure> {
        self.destroyed.store(true, Ordering::SeqCst);
        self.events.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

/// Builds [`MockTransport`]s and remembers every one it built.
#[derive(Default)]
pub struct MockTransportFactory {
    behavior: Mutex<MockBehavior>,
    created: Mutex<Vec<Arc<MockTransport>>>,
}

impl MockTransportFactory {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Changes the behavior of transports created from now on.
    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Number of transports constructed so far.
    pub fn constructed(&self) -> usize {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn constructed_for(&self, session_id: &SessionId) -> usize {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| t.session_id() == session_id)
            .count()
    }

    /// The most recently constructed transport.
    pub fn last(&self) -> Option<Arc<MockTransport>> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(
        &self,
        session_id: &SessionId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Arc<dyn Transport> {
        let behavior = self.behavior.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let transport = Arc::new(MockTransport::new(session_id.clone(), behavior, events));
        self.created.lock().unwrap_or_else(PoisonError::into_inner).push(transport.clone());
        transport
    }
}
