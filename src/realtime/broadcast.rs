//! Row-Change Broadcasting
//!
//! Change events fan out over `tokio::sync::broadcast`: every subscriber
//! receives a copy of every event, and the sender can be cloned into any
//! component that needs to publish.

use crate::shared::ChangeEvent;
use tokio::sync::broadcast;

/// Broadcast sender for row-change events
///
/// Clone this into store implementations and consumers; subscriptions are
/// created from it via [`super::Subscription::subscribe`].
pub type ChangeBroadcast = broadcast::Sender<ChangeEvent>;

/// Create a change broadcast channel with the given buffer capacity
pub fn change_channel(capacity: usize) -> (ChangeBroadcast, broadcast::Receiver<ChangeEvent>) {
    broadcast::channel(capacity)
}

/// Broadcast a change event to all subscribers
///
/// Returns the number of subscribers that received the event; zero when
/// nobody is listening, which is not an error.
pub fn broadcast_change(tx: &ChangeBroadcast, event: ChangeEvent) -> usize {
    match tx.send(event) {
        Ok(subscriber_count) => {
            tracing::debug!("[Realtime] Change broadcast to {} subscribers", subscriber_count);
            subscriber_count
        }
        Err(_) => {
            tracing::debug!("[Realtime] No subscribers for change event");
            0
        }
    }
}
