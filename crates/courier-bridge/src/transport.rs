// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Transport`] implementation over the sidecar client.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use courier_config::BridgeConfig;
use courier_core::{
    CourierError, MediaPayload, OpaqueFailure, SessionId, Transport, TransportEvent,
    TransportFactory,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::BridgeClient;

/// One sidecar-hosted session.
///
/// `initialize` starts the remote client and the event poller; `destroy`
/// stops the poller and releases the remote client.
pub struct BridgeTransport {
    session_id: SessionId,
    client: BridgeClient,
    poll_interval: Duration,
    /// Taken by the poller on first `initialize`.
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    poller: CancellationToken,
}

impl BridgeTransport {
    pub fn new(
        session_id: SessionId,
        client: BridgeClient,
        poll_interval: Duration,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            session_id,
            client,
            poll_interval,
            events: Mutex::new(Some(events)),
            poller: CancellationToken::new(),
        }
    }

    fn start_poller(&self) {
        let Some(tx) = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        tokio::spawn(poll_events(
            self.client.clone(),
            self.session_id.clone(),
            tx,
            self.poller.clone(),
            self.poll_interval,
        ));
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn initialize(&self) -> Result<(), OpaqueFailure> {
        self.client.start(&self.session_id).await?;
        info!(session_id = %self.session_id, "bridge session started");
        self.start_poller();
        Ok(())
    }

    async fn connection_state(&self) -> Result<Option<String>, OpaqueFailure> {
        self.client.state(&self.session_id).await
    }

    async fn is_registered(&self, chat_id: &str) -> Result<bool, OpaqueFailure> {
        self.client.is_registered(&self.session_id, chat_id).await
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<String, OpaqueFailure> {
        self.client.send_text(&self.session_id, chat_id, text).await
    }

    async fn send_media(
        &self,
        chat_id: &str,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<String, OpaqueFailure> {
        self.client
            .send_media(&self.session_id, chat_id, &media, caption)
            .await
    }

    async fn logout(&self) -> Result<(), OpaqueFailure> {
        self.client.logout(&self.session_id).await
    }

    async fn destroy(&self) -> Result<(), OpaqueFailure> {
        self.poller.cancel();
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.client.delete(&self.session_id).await
    }
}

impl Drop for BridgeTransport {
    fn drop(&mut self) {
        self.poller.cancel();
    }
}

/// Long-polls the sidecar and forwards decoded events in order.
async fn poll_events(
    client: BridgeClient,
    session_id: SessionId,
    tx: mpsc::Sender<TransportEvent>,
    token: CancellationToken,
    interval: Duration,
) {
    let mut cursor = 0u64;
    'poll: loop {
        let page = tokio::select! {
            _ = token.cancelled() => break,
            page = client.events(&session_id, cursor) => page,
        };

        match page {
            Ok(page) => {
                cursor = page.cursor;
                for wire in page.events {
                    let Some(event) = wire.into_transport_event(&session_id) else {
                        continue;
                    };
                    if tx.send(event).await.is_err() {
                        debug!(session_id = %session_id, "event receiver closed");
                        break 'poll;
                    }
                }
            }
            Err(failure) => {
                warn!(session_id = %session_id, error = %failure, "event poll failed");
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!(session_id = %session_id, "event poller stopped");
}

/// Creates [`BridgeTransport`]s sharing one HTTP client.
pub struct BridgeTransportFactory {
    client: BridgeClient,
    poll_interval: Duration,
}

impl BridgeTransportFactory {
    pub fn new(config: &BridgeConfig) -> Result<Self, CourierError> {
        Ok(Self {
            client: BridgeClient::new(config)?,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }
}

impl TransportFactory for BridgeTransportFactory {
    fn create(
        &self,
        session_id: &SessionId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Arc<dyn Transport> {
        Arc::new(BridgeTransport::new(
            session_id.clone(),
            self.client.clone(),
            self.poll_interval,
            events,
        ))
    }
}
