// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport trait for the externally controlled messaging client.
//!
//! One transport instance is a heavyweight automation process owned by
//! exactly one session. Every call may hang or fail with an arbitrarily
//! shaped error, so results are `Result<_, OpaqueFailure>` and callers wrap
//! them with a deadline.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::OpaqueFailure;
use crate::types::{InboundMessage, MediaPayload, MessageStatus, SessionId};

/// Lifecycle and traffic callbacks emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A pairing QR payload was issued (may repeat as it refreshes).
    Qr(String),
    /// The scan was accepted or stored credentials were restored.
    Authenticated,
    /// The session is fully usable; carries the channel's own address.
    Ready { address: String },
    /// Authentication was rejected by the remote side.
    AuthFailure(String),
    /// The connection was lost.
    Disconnected(String),
    /// An inbound message.
    Message(InboundMessage),
    /// A delivery or read acknowledgement for a sent message.
    Ack {
        external_id: String,
        status: MessageStatus,
    },
}

/// A live connection to the messaging network.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Starts the client. Lifecycle progress is reported through events.
    async fn initialize(&self) -> Result<(), OpaqueFailure>;

    /// The client's own view of its connection (e.g. `CONNECTED`), if any.
    async fn connection_state(&self) -> Result<Option<String>, OpaqueFailure>;

    /// Whether `chat_id` is a registered endpoint on the network.
    async fn is_registered(&self, chat_id: &str) -> Result<bool, OpaqueFailure>;

    /// Sends text, returning the transport-assigned message id.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<String, OpaqueFailure>;

    /// Sends media with an optional caption, returning the message id.
    async fn send_media(
        &self,
        chat_id: &str,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<String, OpaqueFailure>;

    /// Unlinks the device from the account.
    async fn logout(&self) -> Result<(), OpaqueFailure>;

    /// Releases the underlying automation process.
    async fn destroy(&self) -> Result<(), OpaqueFailure>;
}

/// Builds one transport per session.
pub trait TransportFactory: Send + Sync + 'static {
    /// Creates a transport that reports through `events`. The transport
    /// must drop its sender once destroyed.
    fn create(
        &self,
        session_id: &SessionId,
        events: mpsc::Sender<TransportEvent>,
    ) -> std::sync::Arc<dyn Transport>;
}
