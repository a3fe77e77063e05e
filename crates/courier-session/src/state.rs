// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session lifecycle state machine.
//!
//! States: Initializing -> QrReady -> Authenticated -> Ready, and any ->
//! Disconnected. Restored credentials skip the QR step
//! (Initializing -> Authenticated). A QR payload may refresh while waiting
//! for the scan. Disconnected absorbs every further signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use courier_core::{SessionId, SessionState, SessionStatus, Transport, UserId};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Inputs that drive the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Qr(String),
    Authenticated,
    Ready { address: String },
    Lost { reason: String },
    AuthRejected { reason: String },
}

/// Computes the next state, or `None` if `signal` does not apply in `current`.
pub fn next_state(current: SessionState, signal: &Signal) -> Option<SessionState> {
    use SessionState::*;

    match (current, signal) {
        (Disconnected, _) => None,
        (_, Signal::Lost { .. } | Signal::AuthRejected { .. }) => Some(Disconnected),
        (Initializing | QrReady, Signal::Qr(_)) => Some(QrReady),
        (Initializing | QrReady, Signal::Authenticated) => Some(Authenticated),
        (Authenticated, Signal::Ready { .. }) => Some(Ready),
        _ => None,
    }
}

/// Observable state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Latest pairing payload; present only while `QrReady`.
    pub qr_payload: Option<String>,
    /// The channel's own address, captured on `Ready`.
    pub address: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            state: SessionState::Initializing,
            qr_payload: None,
            address: None,
            updated_at: Utc::now(),
        }
    }
}

/// A live channel session and the transport it exclusively owns.
pub struct Session {
    id: SessionId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    snapshot: watch::Sender<SessionSnapshot>,
    transport: Arc<dyn Transport>,
    released: AtomicBool,
    closed: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(id: SessionId, user_id: UserId, transport: Arc<dyn Transport>) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::initial());
        Self {
            id,
            user_id,
            created_at: Utc::now(),
            snapshot,
            transport,
            released: AtomicBool::new(false),
            closed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        let snap = self.snapshot.borrow();
        SessionStatus {
            session_id: self.id.clone(),
            state: snap.state,
            qr_payload: snap.qr_payload.clone(),
            address: snap.address.clone(),
        }
    }

    /// Watches state changes, e.g. to wait for `Ready`.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Applies `signal`, returning the new snapshot if the state machine accepted it.
    pub fn apply(&self, signal: &Signal) -> Option<SessionSnapshot> {
        let mut applied = None;
        self.snapshot.send_if_modified(|snap| {
            let Some(next) = next_state(snap.state, signal) else {
                return false;
            };
            snap.state = next;
            snap.updated_at = Utc::now();
            match signal {
                Signal::Qr(payload) => snap.qr_payload = Some(payload.clone()),
                Signal::Ready { address } => {
                    snap.qr_payload = None;
                    snap.address = Some(address.clone());
                }
                Signal::Authenticated | Signal::Lost { .. } | Signal::AuthRejected { .. } => {
                    snap.qr_payload = None;
                }
            }
            applied = Some(snap.clone());
            true
        });
        applied
    }

    /// Claims the right to release the transport. `true` exactly once.
    pub(crate) fn claim_release(&self) -> bool {
        !self.released.swap(true, Ordering::AcqRel)
    }

    /// Stops the session's event pump.
    pub(crate) fn close(&self) {
        self.closed.cancel();
    }

    pub(crate) fn closed(&self) -> &CancellationToken {
        &self.closed
    }
}
