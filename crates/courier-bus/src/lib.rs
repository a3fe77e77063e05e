// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed publish/subscribe bus for session lifecycle, inbound traffic, and
//! delivery receipts.
//!
//! Built on `tokio::sync::broadcast`: publishing never waits on
//! subscribers. A subscriber that falls more than `capacity` events behind
//! skips ahead and logs how many it missed.

pub mod events;

use courier_core::{InboundMessage, SessionId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use events::{BusEvent, DeliveryReceipt, Envelope, LifecycleDetail, LifecycleEvent};

/// Cloneable handle to the shared bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Envelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event. Returns the number of receivers it reached.
    pub fn publish(&self, event: BusEvent) -> usize {
        // An error only means nobody is listening.
        self.tx.send(Envelope::new(event)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> BusReceiver {
        BusReceiver {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Invokes `handler` for every lifecycle event of `session_id`.
    pub fn on_lifecycle_event<F>(&self, session_id: SessionId, handler: F) -> Subscription
    where
        F: Fn(LifecycleEvent) + Send + Sync + 'static,
    {
        self.listen(move |event| match event {
            BusEvent::Lifecycle(e) if e.session_id == session_id => handler(e),
            _ => {}
        })
    }

    /// Invokes `handler` for every inbound application message.
    pub fn on_inbound_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(InboundMessage) + Send + Sync + 'static,
    {
        self.listen(move |event| {
            if let BusEvent::Inbound(message) = event {
                handler(message);
            }
        })
    }

    /// Invokes `handler` for every delivery receipt.
    pub fn on_receipt<F>(&self, handler: F) -> Subscription
    where
        F: Fn(DeliveryReceipt) + Send + Sync + 'static,
    {
        self.listen(move |event| {
            if let BusEvent::Receipt(receipt) = event {
                handler(receipt);
            }
        })
    }

    fn listen<F>(&self, handler: F) -> Subscription
    where
        F: Fn(BusEvent) + Send + Sync + 'static,
    {
        let mut rx = self.subscribe();
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(envelope) => handler(envelope.event),
                        None => break,
                    },
                }
            }
            debug!("bus listener stopped");
        });
        Subscription { token, handle }
    }
}

/// Receiving end of a bus subscription.
#[derive(Debug)]
pub struct BusReceiver {
    rx: broadcast::Receiver<Envelope>,
}

impl BusReceiver {
    /// Waits for the next event, skipping over lag. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "bus subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Handle to a listener task. Dropping it stops the listener.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::SessionState;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn lifecycle(id: &str, state: SessionState) -> BusEvent {
        BusEvent::Lifecycle(LifecycleEvent::new(
            SessionId::from(id),
            state,
            LifecycleDetail::None,
        ))
    }

    #[test]
    fn publish_without_subscribers_does_not_fail() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(lifecycle("s1", SessionState::Ready)), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(lifecycle("s1", SessionState::QrReady));

        let envelope = rx.recv().await.unwrap();
        assert!(!envelope.id.is_empty());
        match envelope.event {
            BusEvent::Lifecycle(e) => assert_eq!(e.state, SessionState::QrReady),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_ahead() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(lifecycle("s1", SessionState::Initializing));
        }
        bus.publish(lifecycle("s1", SessionState::Ready));

        let mut last = None;
        while let Ok(Some(env)) =
            tokio::time::timeout(Duration::from_millis(20), rx.recv()).await
        {
            last = Some(env);
        }
        match last.map(|e| e.event) {
            Some(BusEvent::Lifecycle(e)) => assert_eq!(e.state, SessionState::Ready),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn lifecycle_handler_filters_by_session() {
        let bus = EventBus::new(16);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = bus.on_lifecycle_event(SessionId::from("s1"), move |e| {
            sink.lock().unwrap().push(e.state);
        });

        bus.publish(lifecycle("s2", SessionState::Ready));
        bus.publish(lifecycle("s1", SessionState::QrReady));
        bus.publish(lifecycle("s1", SessionState::Authenticated));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionState::QrReady, SessionState::Authenticated]
        );
    }

    #[tokio::test]
    async fn dropping_subscription_stops_listener() {
        let bus = EventBus::new(16);
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        let sub = bus.on_lifecycle_event(SessionId::from("s1"), move |_| {
            *sink.lock().unwrap() += 1;
        });
        bus.publish(lifecycle("s1", SessionState::QrReady));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(sub);
        tokio::time::sleep(Duration::from_millis(20)).await;

        bus.publish(lifecycle("s1", SessionState::Ready));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
