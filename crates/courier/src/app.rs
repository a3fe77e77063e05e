// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Component wiring shared by the subcommands.

use std::sync::Arc;
use std::time::Duration;

use courier_bridge::BridgeTransportFactory;
use courier_bus::{EventBus, LifecycleDetail, Subscription};
use courier_config::CourierConfig;
use courier_core::{CourierError, SessionId, SessionState};
use courier_dispatch::{Dispatcher, HttpMediaFetcher, Repositories, StatusReconciler};
use courier_resilience::TimeoutGuard;
use courier_session::{Session, SessionRegistry, SessionSupervisor};
use courier_storage::{Database, SqliteStore};
use tracing::info;

use crate::qr;

/// The process-wide component graph.
pub struct App {
    pub store: Arc<SqliteStore>,
    pub bus: EventBus,
    pub supervisor: SessionSupervisor,
    pub reconciler: Arc<StatusReconciler>,
    pub dispatcher: Dispatcher,
}

impl App {
    pub async fn build(config: &CourierConfig) -> Result<Self, CourierError> {
        let db = Database::open_from_config(&config.storage).await?;
        let store = Arc::new(SqliteStore::new(db));

        let bus = EventBus::new(config.bus.capacity);
        let registry = Arc::new(SessionRegistry::new());
        let factory = Arc::new(BridgeTransportFactory::new(&config.bridge)?);
        let supervisor = SessionSupervisor::new(
            registry.clone(),
            factory,
            bus.clone(),
            config.session.clone(),
            TimeoutGuard::new(config.dispatch.operation_timeout()),
        );

        let reconciler = Arc::new(StatusReconciler::new(store.clone()));
        let media = Arc::new(HttpMediaFetcher::new(config.dispatch.operation_timeout())?);
        let dispatcher = Dispatcher::new(
            registry,
            Repositories {
                contacts: store.clone(),
                conversations: store.clone(),
                messages: store.clone(),
            },
            media,
            reconciler.clone(),
            config.dispatch.clone(),
        );

        info!(bridge = %config.bridge.base_url, "components initialized");
        Ok(Self {
            store,
            bus,
            supervisor,
            reconciler,
            dispatcher,
        })
    }

    /// Prints every QR payload issued for `session_id` until dropped.
    pub fn print_qr_codes(&self, session_id: &SessionId) -> Subscription {
        let id = session_id.clone();
        self.bus.on_lifecycle_event(session_id.clone(), move |event| {
            if let LifecycleDetail::QrCode { payload } = &event.detail {
                qr::print(&id, payload);
            }
        })
    }

    /// Releases sessions (keeping their credentials) and flushes storage.
    pub async fn shutdown(&self) -> Result<(), CourierError> {
        self.supervisor.shutdown().await;
        self.store.checkpoint().await
    }
}

/// Waits until the session's state satisfies `done`.
pub async fn wait_for_state<F>(
    session: &Session,
    budget: Duration,
    done: F,
) -> Result<SessionState, CourierError>
where
    F: Fn(SessionState) -> bool,
{
    let mut rx = session.watch();
    match tokio::time::timeout(budget, rx.wait_for(|snap| done(snap.state))).await {
        Ok(Ok(snap)) => Ok(snap.state),
        Ok(Err(_)) => Ok(session.state()),
        Err(_) => Err(CourierError::Timeout {
            message: format!(
                "session {} still {} after {budget:?}",
                session.id(),
                session.state()
            ),
            duration: budget,
        }),
    }
}
