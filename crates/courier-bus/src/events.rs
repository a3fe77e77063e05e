// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event payloads carried on the bus.

use chrono::{DateTime, Utc};
use courier_core::{InboundMessage, MessageStatus, SessionId, SessionState};
use serde::{Deserialize, Serialize};

/// Wrapper stamped with an id and publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub at: DateTime<Utc>,
    pub event: BusEvent,
}

impl Envelope {
    pub fn new(event: BusEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            at: Utc::now(),
            event,
        }
    }
}

/// Everything published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    Lifecycle(LifecycleEvent),
    Inbound(InboundMessage),
    Receipt(DeliveryReceipt),
}

/// A session state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub session_id: SessionId,
    pub state: SessionState,
    pub detail: LifecycleDetail,
}

impl LifecycleEvent {
    pub fn new(session_id: SessionId, state: SessionState, detail: LifecycleDetail) -> Self {
        Self {
            session_id,
            state,
            detail,
        }
    }
}

/// State-specific data attached to a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleDetail {
    None,
    QrCode { payload: String },
    Connected { address: String },
    Disconnected { reason: String },
    /// Authentication was rejected; distinct from a plain disconnect.
    AuthRejected { reason: String },
}

/// A delivery or read acknowledgement reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub session_id: SessionId,
    pub external_id: String,
    pub status: MessageStatus,
    pub at: DateTime<Utc>,
}
