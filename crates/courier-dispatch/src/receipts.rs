// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feeds delivery receipts from the bus into the status reconciler.

use std::sync::Arc;

use courier_bus::{BusEvent, EventBus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::reconciler::StatusReconciler;

/// Background task applying receipts in arrival order.
pub struct ReceiptListener {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReceiptListener {
    pub fn spawn(bus: &EventBus, reconciler: Arc<StatusReconciler>) -> Self {
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                let envelope = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };
                let BusEvent::Receipt(receipt) = envelope.event else {
                    continue;
                };
                if let Err(e) = reconciler.apply_receipt(&receipt).await {
                    warn!(
                        external_id = %receipt.external_id,
                        status = %receipt.status,
                        error = %e,
                        "failed to apply delivery receipt"
                    );
                }
            }
            debug!("receipt listener stopped");
        });

        Self { token, handle }
    }

    /// Stops the listener and waits for it to exit.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}
