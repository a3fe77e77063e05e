// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session supervisor: bring-up, teardown, and the per-session event pump.
//!
//! Each session gets one pump task that drains the transport's event queue
//! in order, so transitions for a session are applied one at a time. Every
//! accepted transition is published on the bus without waiting for
//! subscribers.

use std::sync::Arc;

use courier_bus::{BusEvent, DeliveryReceipt, EventBus, LifecycleDetail, LifecycleEvent};
use courier_config::SessionConfig;
use courier_core::{
    CourierError, InboundMessage, SessionId, SessionState, SessionStatus, TransportEvent,
    TransportFactory, UserId,
};
use courier_resilience::{TimeoutGuard, with_timeout};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::SessionRegistry;
use crate::state::{Session, SessionSnapshot, Signal};

/// Owns session lifecycles for one process.
#[derive(Clone)]
pub struct SessionSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<SessionRegistry>,
    factory: Arc<dyn TransportFactory>,
    bus: EventBus,
    config: SessionConfig,
    /// Budget for logout/destroy calls.
    guard: TimeoutGuard,
}

impl SessionSupervisor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        factory: Arc<dyn TransportFactory>,
        bus: EventBus,
        config: SessionConfig,
        guard: TimeoutGuard,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                factory,
                bus,
                config,
                guard,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.inner.registry
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Brings up `session_id` for `user_id`, or joins a bring-up already running.
    ///
    /// Exactly one caller constructs the transport. Others wait (bounded by
    /// the configured wait budget) and receive the same session.
    pub async fn bring_up(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<Arc<Session>, CourierError> {
        let inner = &self.inner;
        if !inner.registry.try_begin_init(session_id) {
            debug!(session_id = %session_id, "session live or initializing, joining");
            let budget = inner.config.init_wait_budget();
            let session = inner
                .registry
                .await_settled(session_id, budget)
                .await?
                .ok_or_else(|| CourierError::ExternalService {
                    message: format!("concurrent initialization of session {session_id} failed"),
                    source: None,
                })?;
            return owned_by(session, user_id);
        }

        let (tx, rx) = mpsc::channel(inner.config.event_buffer.max(1));
        let transport = inner.factory.create(session_id, tx);
        let session = Arc::new(Session::new(
            session_id.clone(),
            user_id.clone(),
            transport,
        ));
        inner.registry.put(session.clone());
        info!(session_id = %session_id, user_id = %user_id, "session initializing");
        inner.publish_lifecycle(&session, &session.snapshot(), LifecycleDetail::None);

        tokio::spawn(pump(inner.clone(), session.clone(), rx));

        let init_timeout = inner.config.init_timeout();
        let outcome = with_timeout(
            session.transport().initialize(),
            init_timeout,
            "transport initialization",
        )
        .await;

        let err = match outcome {
            Ok(Ok(())) if session.state().is_live() => {
                inner.registry.finish_init(session_id);
                debug!(session_id = %session_id, state = %session.state(), "transport initialized");
                return Ok(session);
            }
            Ok(Ok(())) => CourierError::ExternalService {
                message: format!("session {session_id} disconnected during initialization"),
                source: None,
            },
            Ok(Err(failure)) => {
                CourierError::external(format!("transport initialization failed: {failure}"), failure)
            }
            Err(timeout) => CourierError::ExternalService {
                message: timeout.to_string(),
                source: Some(Box::new(timeout)),
            },
        };

        warn!(session_id = %session_id, error = %err, "session bring-up failed");
        inner
            .teardown(
                &session,
                Signal::Lost {
                    reason: err.to_string(),
                },
                false,
            )
            .await;
        inner.registry.finish_init(session_id);
        Err(err)
    }

    /// Logs out (best effort) and releases the transport. The registry entry
    /// is always removed.
    pub async fn destroy(&self, session_id: &SessionId) -> Result<(), CourierError> {
        let session = self
            .inner
            .registry
            .get(session_id)
            .ok_or_else(|| CourierError::not_found("session", session_id.as_str()))?;
        info!(session_id = %session_id, "destroying session");
        self.inner
            .teardown(
                &session,
                Signal::Lost {
                    reason: "destroyed".into(),
                },
                true,
            )
            .await;
        // A bring-up still waiting on the handshake must not keep the id reserved.
        self.inner.registry.finish_init(session_id);
        Ok(())
    }

    /// Destroys the session and brings it up again for the same user.
    pub async fn restart(&self, session_id: &SessionId) -> Result<Arc<Session>, CourierError> {
        let user_id = self
            .inner
            .registry
            .get(session_id)
            .map(|s| s.user_id().clone())
            .ok_or_else(|| CourierError::not_found("session", session_id.as_str()))?;
        self.destroy(session_id).await?;
        self.bring_up(&user_id, session_id).await
    }

    pub fn status(&self, session_id: &SessionId) -> Result<SessionStatus, CourierError> {
        self.inner
            .registry
            .get(session_id)
            .map(|s| s.status())
            .ok_or_else(|| CourierError::not_found("session", session_id.as_str()))
    }

    /// Releases every session's transport without logging out, keeping
    /// stored credentials for the next start.
    pub async fn shutdown(&self) {
        let sessions = self.inner.registry.list();
        info!(count = sessions.len(), "shutting down sessions");
        for session in sessions {
            self.inner
                .teardown(
                    &session,
                    Signal::Lost {
                        reason: "shutdown".into(),
                    },
                    false,
                )
                .await;
        }
    }
}

fn owned_by(session: Arc<Session>, user_id: &UserId) -> Result<Arc<Session>, CourierError> {
    if session.user_id() != user_id {
        return Err(CourierError::Validation(format!(
            "session {} belongs to another user",
            session.id()
        )));
    }
    Ok(session)
}

impl Inner {
    fn publish_lifecycle(&self, session: &Session, snap: &SessionSnapshot, detail: LifecycleDetail) {
        self.bus.publish(BusEvent::Lifecycle(LifecycleEvent::new(
            session.id().clone(),
            snap.state,
            detail,
        )));
    }

    /// Applies `signal`; publishes and logs if the state machine accepted it.
    fn transition(&self, session: &Session, signal: Signal) -> bool {
        let Some(snap) = session.apply(&signal) else {
            debug!(session_id = %session.id(), state = %session.state(), ?signal, "signal ignored");
            return false;
        };
        info!(session_id = %session.id(), state = %snap.state, "session transition");

        let detail = match signal {
            Signal::Qr(payload) => LifecycleDetail::QrCode { payload },
            Signal::Authenticated => LifecycleDetail::None,
            Signal::Ready { address } => LifecycleDetail::Connected { address },
            Signal::Lost { reason } => LifecycleDetail::Disconnected { reason },
            Signal::AuthRejected { reason } => LifecycleDetail::AuthRejected { reason },
        };
        self.publish_lifecycle(session, &snap, detail);
        self.registry.notify();
        true
    }

    /// Moves the session to `Disconnected`, removes it, and releases its transport.
    async fn teardown(&self, session: &Arc<Session>, signal: Signal, logout: bool) {
        session.close();
        self.registry.remove_instance(session);
        self.transition(session, signal);

        if !session.claim_release() {
            return;
        }
        let transport = session.transport();
        if logout {
            match self.guard.run(transport.logout(), "transport logout").await {
                Ok(Ok(())) => debug!(session_id = %session.id(), "logged out"),
                Ok(Err(failure)) => {
                    warn!(session_id = %session.id(), error = %failure, "graceful logout failed")
                }
                Err(e) => warn!(session_id = %session.id(), error = %e, "graceful logout failed"),
            }
        }
        match self.guard.run(transport.destroy(), "transport destroy").await {
            Ok(Ok(())) => debug!(session_id = %session.id(), "transport released"),
            Ok(Err(failure)) => {
                warn!(session_id = %session.id(), error = %failure, "transport destroy failed")
            }
            Err(e) => warn!(session_id = %session.id(), error = %e, "transport destroy failed"),
        }
    }

    fn republish_inbound(&self, session: &Session, message: InboundMessage) {
        if message.is_system() {
            debug!(
                session_id = %session.id(),
                from = %message.from,
                "discarding system message"
            );
            return;
        }
        self.bus.publish(BusEvent::Inbound(message));
    }
}

/// Drains one session's transport events in arrival order.
async fn pump(inner: Arc<Inner>, session: Arc<Session>, mut events: mpsc::Receiver<TransportEvent>) {
    loop {
        let event = tokio::select! {
            _ = session.closed().cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            TransportEvent::Qr(payload) => {
                if inner.transition(&session, Signal::Qr(payload)) {
                    inner.registry.finish_init(session.id());
                }
            }
            TransportEvent::Authenticated => {
                if inner.transition(&session, Signal::Authenticated) {
                    inner.registry.finish_init(session.id());
                }
            }
            TransportEvent::Ready { address } => {
                inner.transition(&session, Signal::Ready { address });
            }
            TransportEvent::Disconnected(reason) => {
                inner.teardown(&session, Signal::Lost { reason }, false).await;
                inner.registry.finish_init(session.id());
                break;
            }
            TransportEvent::AuthFailure(reason) => {
                inner
                    .teardown(&session, Signal::AuthRejected { reason }, false)
                    .await;
                inner.registry.finish_init(session.id());
                break;
            }
            TransportEvent::Message(mut message) => {
                message.session_id = session.id().clone();
                inner.republish_inbound(&session, message);
            }
            TransportEvent::Ack {
                external_id,
                status,
            } => {
                inner.bus.publish(BusEvent::Receipt(DeliveryReceipt {
                    session_id: session.id().clone(),
                    external_id,
                    status,
                    at: chrono::Utc::now(),
                }));
            }
        }
    }
    debug!(session_id = %session.id(), state = %session.state(), "event pump stopped");
    if session.state() == SessionState::Disconnected {
        inner.registry.remove_instance(&session);
    }
}
