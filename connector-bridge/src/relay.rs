//! Fan-out of device events to live subscribers.
//!
//! Built on a `tokio::sync::broadcast` channel: publishing never waits on a
//! subscriber, each subscriber has its own bounded backlog, and one that
//! falls behind loses its oldest events without affecting anybody else.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::schema::ResourceValue;

/// Event pushed to live subscribers.
///
/// Serialized as `{"event": "<endpoint id>", "value": <value>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveEvent {
    /// Endpoint the value belongs to
    pub event: String,
    /// Decoded value
    pub value: ResourceValue,
}

/// Republishes endpoint values to every currently connected subscriber.
///
/// Cloning is cheap; all clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct FanOutRelay {
    sender: broadcast::Sender<LiveEvent>,
}

impl FanOutRelay {
    /// Create a relay where every subscriber buffers up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Deliver `value` for `endpoint_id` to all current subscribers.
    ///
    /// Subscribers that connect later do not see it.
    ///
    /// # Returns
    ///
    /// The number of subscribers the event was queued for.
    pub fn publish(&self, endpoint_id: &str, value: ResourceValue) -> usize {
        let event = LiveEvent {
            event: endpoint_id.to_string(),
            value,
        };

        // Err only means nobody is listening right now
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(endpoint = %endpoint_id, delivered, "Published live event");
        delivered
    }

    /// Start receiving events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FanOutRelay {
    fn default() -> Self {
        Self::new(256)
    }
}
