// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message status reconciler: the single writer of message status.
//!
//! Updates for one message id are serialized through a keyed lock, and each
//! update is checked against the monotonic chain
//! `PENDING -> SENT -> DELIVERED -> READ` (with `FAILED` reachable only from
//! `PENDING`/`SENT`). Out-of-order updates are dropped, not applied.
//!
//! A transport may acknowledge a message before the send call that created
//! it has returned its id. Such receipts are parked by external id for a
//! while and replayed when [`StatusReconciler::mark_sent`] records that id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_bus::DeliveryReceipt;
use courier_core::{CourierError, Message, MessagePatch, MessageRepository, MessageStatus};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long a receipt for an unrecorded external id is kept.
const PARKED_TTL: Duration = Duration::from_secs(300);

/// Maximum number of external ids with parked receipts.
const PARKED_CAPACITY: usize = 1024;

struct ParkedReceipt {
    receipt: DeliveryReceipt,
    parked_at: Instant,
}

pub struct StatusReconciler {
    messages: Arc<dyn MessageRepository>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    parked: Mutex<HashMap<String, Vec<ParkedReceipt>>>,
}

impl StatusReconciler {
    pub fn new(messages: Arc<dyn MessageRepository>) -> Self {
        Self {
            messages,
            locks: DashMap::new(),
            parked: Mutex::new(HashMap::new()),
        }
    }

    /// Records a successful send and the transport-assigned id, then replays
    /// any receipts that arrived for that id first.
    pub async fn mark_sent(
        &self,
        message_id: &str,
        external_id: &str,
    ) -> Result<Option<Message>, CourierError> {
        let patch = MessagePatch {
            external_id: Some(external_id.to_string()),
            ..MessagePatch::status(MessageStatus::Sent)
        };

        let lock = self.lock_for(message_id);
        let result = {
            let _guard = lock.lock().await;
            self.record_sent_locked(message_id, external_id, patch).await
        };
        self.release(message_id, lock);
        result
    }

    async fn record_sent_locked(
        &self,
        message_id: &str,
        external_id: &str,
        patch: MessagePatch,
    ) -> Result<Option<Message>, CourierError> {
        let sent = self
            .apply_locked(message_id, MessageStatus::Sent, |_| patch)
            .await?;
        let mut early = self
            .parked
            .lock()
            .await
            .remove(external_id)
            .unwrap_or_default();
        let Some(mut latest) = sent else {
            return Ok(None);
        };

        early.sort_by_key(|p| p.receipt.status == MessageStatus::Read);
        for parked in early {
            let receipt = parked.receipt;
            debug!(message_id, external_id, status = %receipt.status, "replaying early receipt");
            let applied = self
                .apply_locked(message_id, receipt.status, |current| {
                    receipt_patch(current, receipt.status, receipt.at)
                })
                .await?;
            if let Some(updated) = applied {
                latest = updated;
            }
        }
        Ok(Some(latest))
    }

    pub async fn mark_failed(&self, message_id: &str) -> Result<Option<Message>, CourierError> {
        self.transition(message_id, MessageStatus::Failed, |_| {
            MessagePatch::status(MessageStatus::Failed)
        })
        .await
    }

    pub async fn mark_delivered(
        &self,
        message_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Message>, CourierError> {
        self.transition(message_id, MessageStatus::Delivered, |current| {
            receipt_patch(current, MessageStatus::Delivered, at)
        })
        .await
    }

    /// Marks a message read. A missing delivery time is filled with `at`.
    pub async fn mark_read(
        &self,
        message_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Message>, CourierError> {
        self.transition(message_id, MessageStatus::Read, |current| {
            receipt_patch(current, MessageStatus::Read, at)
        })
        .await
    }

    /// Applies a receipt reported against the transport's message id.
    ///
    /// A delivered/read receipt for an id no message carries yet is parked
    /// and returns `Ok(None)`.
    pub async fn apply_receipt(
        &self,
        receipt: &DeliveryReceipt,
    ) -> Result<Option<Message>, CourierError> {
        if !matches!(receipt.status, MessageStatus::Delivered | MessageStatus::Read) {
            debug!(
                external_id = %receipt.external_id,
                status = %receipt.status,
                "receipt status not tracked, dropped"
            );
            return Ok(None);
        }

        if let Some(message) = self
            .messages
            .find_by_external_id(&receipt.external_id)
            .await?
        {
            return self.apply_receipt_to(&message.id, receipt).await;
        }

        // Look again while holding the parking lot: `mark_sent` drains it
        // only after writing the external id.
        let mut parked = self.parked.lock().await;
        if let Some(message) = self
            .messages
            .find_by_external_id(&receipt.external_id)
            .await?
        {
            drop(parked);
            return self.apply_receipt_to(&message.id, receipt).await;
        }
        park(&mut parked, receipt.clone());
        debug!(
            external_id = %receipt.external_id,
            status = %receipt.status,
            "receipt for unrecorded message parked"
        );
        Ok(None)
    }

    async fn apply_receipt_to(
        &self,
        message_id: &str,
        receipt: &DeliveryReceipt,
    ) -> Result<Option<Message>, CourierError> {
        match receipt.status {
            MessageStatus::Read => self.mark_read(message_id, receipt.at).await,
            _ => self.mark_delivered(message_id, receipt.at).await,
        }
    }

    fn lock_for(&self, message_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(message_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release(&self, message_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(message_id, |_, l| Arc::strong_count(l) == 1);
    }

    /// Reads, checks, and writes under the message's lock.
    ///
    /// Returns `Ok(None)` when the transition is not allowed from the
    /// current status.
    async fn transition<F>(
        &self,
        message_id: &str,
        next: MessageStatus,
        patch: F,
    ) -> Result<Option<Message>, CourierError>
    where
        F: FnOnce(&Message) -> MessagePatch,
    {
        let lock = self.lock_for(message_id);
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(message_id, next, patch).await
        };
        self.release(message_id, lock);
        result
    }

    async fn apply_locked<F>(
        &self,
        message_id: &str,
        next: MessageStatus,
        patch: F,
    ) -> Result<Option<Message>, CourierError>
    where
        F: FnOnce(&Message) -> MessagePatch,
    {
        let current = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| CourierError::not_found("message", message_id))?;

        if !current.status.can_transition_to(next) {
            debug!(
                message_id,
                from = %current.status,
                to = %next,
                "out-of-order status update dropped"
            );
            return Ok(None);
        }

        let updated = self.messages.update(message_id, patch(&current)).await?;
        info!(message_id, from = %current.status, to = %next, "message status updated");
        Ok(Some(updated))
    }
}

/// Patch for a delivered or read receipt. Read also fills a missing
/// delivery time.
fn receipt_patch(current: &Message, status: MessageStatus, at: DateTime<Utc>) -> MessagePatch {
    if status == MessageStatus::Read {
        MessagePatch {
            read_at: Some(at),
            delivered_at: current.delivered_at.is_none().then_some(at),
            ..MessagePatch::status(MessageStatus::Read)
        }
    } else {
        MessagePatch {
            delivered_at: Some(at),
            ..MessagePatch::status(status)
        }
    }
}

/// Parks `receipt`, evicting expired entries and, at capacity, the oldest id.
fn park(parked: &mut HashMap<String, Vec<ParkedReceipt>>, receipt: DeliveryReceipt) {
    parked.retain(|_, receipts| {
        receipts.retain(|p| p.parked_at.elapsed() < PARKED_TTL);
        !receipts.is_empty()
    });

    if !parked.contains_key(&receipt.external_id) && parked.len() >= PARKED_CAPACITY {
        let oldest = parked
            .iter()
            .filter_map(|(id, receipts)| receipts.first().map(|p| (p.parked_at, id.clone())))
            .min()
            .map(|(_, id)| id);
        if let Some(id) = oldest {
            warn!(external_id = %id, "parked receipts evicted at capacity");
            parked.remove(&id);
        }
    }

    parked
        .entry(receipt.external_id.clone())
        .or_default()
        .push(ParkedReceipt {
            receipt,
            parked_at: Instant::now(),
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::SessionId;

    fn receipt(external_id: &str) -> DeliveryReceipt {
        DeliveryReceipt {
            session_id: SessionId::from("s1"),
            external_id: external_id.into(),
            status: MessageStatus::Delivered,
            at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expired_receipts_are_evicted_on_park() {
        let mut parked = HashMap::new();
        park(&mut parked, receipt("old"));
        tokio::time::advance(PARKED_TTL + Duration::from_secs(1)).await;
        park(&mut parked, receipt("new"));
        assert!(!parked.contains_key("old"));
        assert!(parked.contains_key("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn parking_is_bounded() {
        let mut parked = HashMap::new();
        for n in 0..PARKED_CAPACITY {
            park(&mut parked, receipt(&format!("ext-{n}")));
            tokio::time::advance(Duration::from_millis(1)).await;
        }
        park(&mut parked, receipt("one-more"));
        assert_eq!(parked.len(), PARKED_CAPACITY);
        assert!(!parked.contains_key("ext-0"));
        assert!(parked.contains_key("one-more"));
    }
}
