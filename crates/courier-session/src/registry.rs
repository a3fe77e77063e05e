// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry: the single shared table of live sessions.
//!
//! All mutation goes through the atomic operations here. The "initializing"
//! marker set and the session table are guarded by one lock, so
//! [`SessionRegistry::try_begin_init`] is a single check-and-set over both.
//! Callers that lose the race await change notifications instead of polling.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use courier_core::{CourierError, SessionId, SessionState, UserId};
use tokio::sync::watch;
use tracing::debug;

use crate::state::Session;

#[derive(Default)]
struct Table {
    sessions: HashMap<SessionId, Arc<Session>>,
    initializing: HashSet<SessionId>,
}

/// Injectable registry of sessions keyed by id.
pub struct SessionRegistry {
    table: Mutex<Table>,
    /// Bumped on every change that could settle a pending bring-up.
    generation: watch::Sender<u64>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            table: Mutex::new(Table::default()),
            generation,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // The table holds no invariants a panicking holder could break halfway.
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wakes callers waiting in [`SessionRegistry::await_settled`].
    pub fn notify(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.lock().sessions.get(id).cloned()
    }

    /// Atomically claims the right to construct session `id`.
    ///
    /// Returns `false` when a live session exists or another bring-up holds
    /// the marker; the caller should await and reuse. A `Disconnected`
    /// leftover does not block.
    pub fn try_begin_init(&self, id: &SessionId) -> bool {
        let mut table = self.lock();
        if table.initializing.contains(id) {
            return false;
        }
        if table.sessions.get(id).is_some_and(|s| s.state().is_live()) {
            return false;
        }
        table.initializing.insert(id.clone());
        true
    }

    /// Clears the initializing marker. Idempotent.
    pub fn finish_init(&self, id: &SessionId) {
        let cleared = self.lock().initializing.remove(id);
        if cleared {
            debug!(session_id = %id, "initializing marker cleared");
            self.notify();
        }
    }

    pub fn is_initializing(&self, id: &SessionId) -> bool {
        self.lock().initializing.contains(id)
    }

    /// Inserts or replaces a session.
    pub fn put(&self, session: Arc<Session>) {
        self.lock().sessions.insert(session.id().clone(), session);
        self.notify();
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.lock().sessions.remove(id);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Removes `session` only if it is still the registered instance for its id.
    ///
    /// A restart may already have registered a successor under the same id.
    pub fn remove_instance(&self, session: &Arc<Session>) -> bool {
        let removed = {
            let mut table = self.lock();
            match table.sessions.get(session.id()) {
                Some(current) if Arc::ptr_eq(current, session) => {
                    table.sessions.remove(session.id());
                    true
                }
                _ => false,
            }
        };
        if removed {
            self.notify();
        }
        removed
    }

    pub fn list_by_user(&self, user_id: &UserId) -> Vec<Arc<Session>> {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.user_id() == user_id)
            .cloned()
            .collect()
    }

    pub fn list(&self) -> Vec<Arc<Session>> {
        self.lock().sessions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Some(outcome)` once a bring-up of `id` has settled.
    ///
    /// Settled means the session exists and has left `Initializing` (or its
    /// bring-up finished), or it is absent with no bring-up in flight
    /// (`Some(None)`: the winner failed).
    fn settled(&self, id: &SessionId) -> Option<Option<Arc<Session>>> {
        let table = self.lock();
        let initializing = table.initializing.contains(id);
        match table.sessions.get(id) {
            Some(s) if s.state() != SessionState::Initializing || !initializing => {
                Some(Some(s.clone()))
            }
            Some(_) => None,
            None if !initializing => Some(None),
            None => None,
        }
    }

    /// Waits up to `budget` for a concurrent bring-up of `id` to settle.
    ///
    /// Fails with [`CourierError::InitInProgress`] if it does not.
    pub async fn await_settled(
        &self,
        id: &SessionId,
        budget: Duration,
    ) -> Result<Option<Arc<Session>>, CourierError> {
        let mut changes = self.generation.subscribe();
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            changes.borrow_and_update();
            if let Some(outcome) = self.settled(id) {
                return Ok(outcome);
            }
            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                // The sender lives in `self`; it cannot be dropped while we borrow it.
                Ok(Err(_)) => {
                    return Err(CourierError::Internal(
                        "session registry notifier closed".into(),
                    ));
                }
                Err(_elapsed) => {
                    return Err(CourierError::InitInProgress {
                        session_id: id.to_string(),
                        waited: budget,
                    });
                }
            }
        }
    }
}
