//! Broadcast-channel backed event bus.
//!
//! A thin wrapper over `tokio::sync::broadcast` so every long-lived task
//! can subscribe independently; a slow subscriber that falls behind the
//! broadcast capacity observes `Lagged` and resynchronizes by re-querying
//! state rather than blocking producers.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::NodeEvent;

pub const DEFAULT_CAPACITY: usize = 4096;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<NodeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; returns the number of live subscribers that saw it.
    /// Notifications should become visible only after the triggering state
    /// change is committed — callers are responsible for calling this only
    /// after that point.
    pub fn publish(&self, event: NodeEvent) -> usize {
        match self.sender.send(event) {
            Ok(n) => {
                debug!(subscribers = n, "published node event");
                n
            }
            Err(_) => {
                debug!("published node event with zero subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            inner: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventReceiver {
    inner: broadcast::Receiver<NodeEvent>,
}

impl EventReceiver {
    /// Receives the next event, transparently skipping over any `Lagged`
    /// notifications (logged as a warning) rather than surfacing them as an
    /// error to callers that don't care about exact delivery counts.
    pub async fn recv(&mut self) -> Option<NodeEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event bus subscriber lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NodeEvent;
    use node_types::UInt256;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(NodeEvent::TransactionAdmitted {
            hash: UInt256::ZERO,
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, NodeEvent::TransactionAdmitted { .. }));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_fine() {
        let bus = EventBus::new();
        let n = bus.publish(NodeEvent::ViewChanged { height: 1, view: 0 });
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_the_event() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.publish(NodeEvent::PeerConnected {
            address: "127.0.0.1:10333".into(),
        });
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
