// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the session, dispatch, and storage crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Opaque session identifier, stable across restarts for a given user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Identifier of the user owning sessions, contacts, and messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a channel session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Initializing,
    QrReady,
    Authenticated,
    Ready,
    Disconnected,
}

impl SessionState {
    /// Any state other than `Disconnected` occupies the session id.
    pub fn is_live(self) -> bool {
        self != SessionState::Disconnected
    }

    /// States through which outbound messages may be dispatched.
    pub fn can_send(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Authenticated)
    }
}

/// Point-in-time view of a session for API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Delivery status of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    Received,
}

impl MessageStatus {
    /// Position on the outbound chain `PENDING -> SENT -> DELIVERED -> READ`.
    fn rank(self) -> Option<u8> {
        match self {
            MessageStatus::Pending => Some(0),
            MessageStatus::Sent => Some(1),
            MessageStatus::Delivered => Some(2),
            MessageStatus::Read => Some(3),
            MessageStatus::Failed | MessageStatus::Received => None,
        }
    }

    /// No update may leave a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageStatus::Failed | MessageStatus::Read | MessageStatus::Received
        )
    }

    /// Whether moving from `self` to `next` respects the monotonic chain.
    ///
    /// Forward moves along the chain may skip steps (a read receipt can
    /// arrive before the delivery receipt). `FAILED` is reachable only from
    /// `PENDING` or `SENT`. Repeats and backwards moves are rejected.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == MessageStatus::Failed {
            return matches!(self, MessageStatus::Pending | MessageStatus::Sent);
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

/// Direction of a message relative to the owning user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Content kind of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Text,
    Document,
}

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub contact_id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub status: MessageStatus,
    /// Transport-assigned id, set only after a successful send.
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Fields for creating a message row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub user_id: String,
    pub contact_id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub status: MessageStatus,
}

/// Partial update of a message row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePatch {
    pub status: Option<MessageStatus>,
    pub external_id: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

impl MessagePatch {
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// A contact owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub user_id: String,
    /// Normalized digits-only address.
    pub phone_number: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values applied only when `find_or_create` creates a new contact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDefaults {
    pub name: Option<String>,
}

/// A conversation between a user and one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub contact_id: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An outbound send request.
///
/// Either `contact_id` or a raw `address` identifies the recipient; at
/// least one of `content` and `media_url` must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
}

impl SendRequest {
    /// A text message to an existing contact.
    pub fn text_to_contact(contact_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            contact_id: Some(contact_id.into()),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// A text message to a raw address.
    pub fn text_to_address(address: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_media(mut self, media_url: impl Into<String>) -> Self {
        self.media_url = Some(media_url.into());
        self
    }
}

/// A message received by a session from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub session_id: SessionId,
    pub external_id: String,
    /// Sender address as reported by the transport (may carry a suffix).
    pub from: String,
    pub body: Option<String>,
    #[serde(default)]
    pub has_media: bool,
    /// Set by the transport for status/story updates.
    #[serde(default)]
    pub is_status: bool,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Broadcast-list and status-feed traffic is not an application message.
    pub fn is_system(&self) -> bool {
        self.is_status || self.from.ends_with("@broadcast")
    }
}

/// Base64-encoded media ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub mime_type: String,
    pub data: String,
    pub filename: Option<String>,
}
