// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the bus, registry, supervisor, reconciler, and
//! dispatcher over a mock transport factory and in-memory repositories.

use std::sync::Arc;
use std::time::Duration;

use courier_bus::EventBus;
use courier_config::{DispatchConfig, SessionConfig};
use courier_core::{CourierError, Message, SendRequest, SessionId, SessionState, UserId};
use courier_dispatch::{Dispatcher, Repositories, StatusReconciler};
use courier_resilience::TimeoutGuard;
use courier_session::{Session, SessionRegistry, SessionSupervisor};

use crate::memory_store::InMemoryStore;
use crate::mock_media::MockMediaFetcher;
use crate::mock_transport::{MockBehavior, MockTransportFactory};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    behavior: MockBehavior,
    session: SessionConfig,
    dispatch: DispatchConfig,
    media: MockMediaFetcher,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            behavior: MockBehavior::default(),
            session: SessionConfig {
                init_timeout_ms: 5_000,
                init_wait_attempts: 50,
                init_wait_interval_ms: 100,
                ..SessionConfig::default()
            },
            dispatch: DispatchConfig::default(),
            media: MockMediaFetcher::ok(),
        }
    }

    /// Behavior of every transport the factory builds.
    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    pub fn with_dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.dispatch = config;
        self
    }

    /// Per-call budget for registration checks, media fetches, and sends.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch.operation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_media(mut self, media: MockMediaFetcher) -> Self {
        self.media = media;
        self
    }

    pub fn build(self) -> TestHarness {
        let bus = EventBus::new(256);
        let registry = Arc::new(SessionRegistry::new());
        let factory = Arc::new(MockTransportFactory::new(self.behavior));
        let supervisor = SessionSupervisor::new(
            registry.clone(),
            factory.clone(),
            bus.clone(),
            self.session,
            TimeoutGuard::new(self.dispatch.operation_timeout()),
        );

        let store = Arc::new(InMemoryStore::new());
        let reconciler = Arc::new(StatusReconciler::new(store.clone()));
        let media = Arc::new(self.media);
        let dispatcher = Dispatcher::new(
            registry.clone(),
            Repositories {
                contacts: store.clone(),
                conversations: store.clone(),
                messages: store.clone(),
            },
            media.clone(),
            reconciler.clone(),
            self.dispatch,
        );

        TestHarness {
            bus,
            registry,
            factory,
            supervisor,
            store,
            reconciler,
            media,
            dispatcher,
        }
    }
}

/// A complete dispatch stack over mocks.
pub struct TestHarness {
    pub bus: EventBus,
    pub registry: Arc<SessionRegistry>,
    pub factory: Arc<MockTransportFactory>,
    pub supervisor: SessionSupervisor,
    pub store: Arc<InMemoryStore>,
    pub reconciler: Arc<StatusReconciler>,
    pub media: Arc<MockMediaFetcher>,
    pub dispatcher: Dispatcher,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Brings up a session and waits for `state`.
    pub async fn connect(
        &self,
        user_id: &str,
        session_id: &str,
        state: SessionState,
    ) -> Result<Arc<Session>, CourierError> {
        let session = self
            .supervisor
            .bring_up(&UserId::from(user_id), &SessionId::from(session_id))
            .await?;
        wait_for_state(&session, state, Duration::from_secs(5)).await?;
        Ok(session)
    }

    pub async fn send(&self, user_id: &str, request: SendRequest) -> Result<Message, CourierError> {
        self.dispatcher.send(&UserId::from(user_id), request).await
    }
}

/// Waits until `session` reaches `state`.
pub async fn wait_for_state(
    session: &Session,
    state: SessionState,
    budget: Duration,
) -> Result<(), CourierError> {
    let mut rx = session.watch();
    let reached = tokio::time::timeout(budget, rx.wait_for(|snap| snap.state == state)).await;
    match reached {
        Ok(Ok(_)) => Ok(()),
        _ => Err(CourierError::Timeout {
            message: format!(
                "session {} did not reach {state} (currently {})",
                session.id(),
                session.state()
            ),
            duration: budget,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_connects_and_sends() {
        let harness = TestHarness::builder().build();
        harness
            .connect("u1", "s1", SessionState::Ready)
            .await
            .unwrap();
        let message = harness
            .send("u1", SendRequest::text_to_address("+1 555 123 4567", "hi"))
            .await
            .unwrap();
        assert_eq!(message.status, courier_core::MessageStatus::Sent);
        assert_eq!(harness.factory.constructed(), 1);
    }
}
