// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types exchanged with the sidecar.
//!
//! Events are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "qr", "payload": "2@abc..."}
//! {"type": "ready", "address": "15550000000"}
//! {"type": "ack", "id": "3EB0...", "ack": 3}
//! ```

use chrono::{DateTime, Utc};
use courier_core::{InboundMessage, MediaPayload, MessageStatus, SessionId, TransportEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct StateResponse {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisteredRequest<'a> {
    pub address: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RegisteredResponse {
    pub registered: bool,
}

#[derive(Debug, Serialize)]
pub struct SendTextRequest<'a> {
    pub to: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SendMediaRequest<'a> {
    pub to: &'a str,
    pub media: &'a MediaPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct SentResponse {
    pub id: String,
}

/// One page of events after a cursor.
#[derive(Debug, Deserialize)]
pub struct EventsPage {
    /// Cursor to pass on the next poll.
    pub cursor: u64,
    #[serde(default)]
    pub events: Vec<WireEvent>,
}

/// An event as reported by the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Qr {
        payload: String,
    },
    Authenticated,
    Ready {
        address: String,
    },
    AuthFailure {
        #[serde(default)]
        reason: String,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    Message {
        id: String,
        from: String,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        has_media: bool,
        #[serde(default)]
        is_status: bool,
        /// Unix seconds.
        timestamp: i64,
    },
    /// Acknowledgement level: 1 server, 2 device, 3 read, 4 played.
    Ack {
        id: String,
        ack: i64,
    },
    /// Event types this build does not know about.
    #[serde(other)]
    Unknown,
}

impl WireEvent {
    /// Converts to a transport event. Returns `None` for events with no
    /// lifecycle or status meaning (server acks, unknown types).
    pub fn into_transport_event(self, session_id: &SessionId) -> Option<TransportEvent> {
        let event = match self {
            WireEvent::Qr { payload } => TransportEvent::Qr(payload),
            WireEvent::Authenticated => TransportEvent::Authenticated,
            WireEvent::Ready { address } => TransportEvent::Ready { address },
            WireEvent::AuthFailure { reason } => TransportEvent::AuthFailure(reason),
            WireEvent::Disconnected { reason } => TransportEvent::Disconnected(reason),
            WireEvent::Message {
                id,
                from,
                body,
                has_media,
                is_status,
                timestamp,
            } => TransportEvent::Message(InboundMessage {
                session_id: session_id.clone(),
                external_id: id,
                from,
                body,
                has_media,
                is_status,
                timestamp: DateTime::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now),
            }),
            WireEvent::Ack { id, ack } => TransportEvent::Ack {
                external_id: id,
                status: ack_status(ack)?,
            },
            WireEvent::Unknown => return None,
        };
        Some(event)
    }
}

fn ack_status(level: i64) -> Option<MessageStatus> {
    match level {
        2 => Some(MessageStatus::Delivered),
        3 | 4 => Some(MessageStatus::Read),
        _ => None,
    }
}
