//! Filtered Change Subscriptions
//!
//! A `Subscription` wraps a broadcast receiver with a relation/op/predicate
//! filter. Non-matching events are skipped in place; a lagged receiver logs
//! and keeps listening rather than dropping the subscription. Delivery is
//! at-least-once and carries no ordering guarantee across subscriptions.

use uuid::Uuid;

use crate::shared::{ChangeEvent, ChangeOp, Relation};

use super::broadcast::ChangeBroadcast;

/// Which events a subscription wants
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    /// Relation to observe
    pub relation: Relation,
    /// Accepted change kinds
    pub ops: Vec<ChangeOp>,
    /// For message events: restrict to one conversation
    pub conversation_id: Option<Uuid>,
}

impl ChangeFilter {
    /// Inserts on the global message relation (directory invalidation)
    pub fn message_inserts() -> Self {
        Self {
            relation: Relation::Messages,
            ops: vec![ChangeOp::Insert],
            conversation_id: None,
        }
    }

    /// Message inserts scoped to a single conversation (live feed)
    pub fn conversation_message_inserts(conversation_id: Uuid) -> Self {
        Self {
            relation: Relation::Messages,
            ops: vec![ChangeOp::Insert],
            conversation_id: Some(conversation_id),
        }
    }

    /// Whether an event passes this filter
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.relation != self.relation || !self.ops.contains(&event.op) {
            return false;
        }
        match self.conversation_id {
            None => true,
            Some(conversation_id) => event
                .decode_message()
                .map(|m| m.conversation_id == conversation_id)
                .unwrap_or(false),
        }
    }
}

/// A live, filtered view of the change broadcast
///
/// Dropping the subscription unsubscribes; there is no other cleanup.
pub struct Subscription {
    rx: tokio::sync::broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl Subscription {
    /// Subscribe to the broadcast with a filter
    pub fn subscribe(tx: &ChangeBroadcast, filter: ChangeFilter) -> Self {
        Self {
            rx: tx.subscribe(),
            filter,
        }
    }

    /// Receive the next matching event
    ///
    /// Returns `None` once the broadcast channel is closed. A lagged receiver
    /// skips the lost events and keeps listening.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Realtime] Subscription lagged, skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    tracing::debug!("[Realtime] Change broadcast closed, ending subscription");
                    return None;
                }
            }
        }
    }

    /// Consume the subscription as a `Stream` of matching events
    pub fn into_stream(self) -> impl tokio_stream::Stream<Item = ChangeEvent> {
        futures_util::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::broadcast::{broadcast_change, change_channel};
    use crate::shared::messaging::MessageRow;
    use chrono::Utc;
    use futures_util::StreamExt;

    fn message_in(conversation_id: Uuid) -> MessageRow {
        MessageRow {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: Uuid::new_v4(),
            content: "hola".to_string(),
            created_at: Utc::now(),
            read: false,
        }
    }

    #[test]
    fn test_filter_matches_relation_and_op() {
        let conv = Uuid::new_v4();
        let filter = ChangeFilter::message_inserts();
        assert!(filter.matches(&ChangeEvent::message_insert(&message_in(conv))));
        assert!(!filter.matches(&ChangeEvent::conversation_delete(conv)));
    }

    #[test]
    fn test_filter_scopes_to_conversation() {
        let conv = Uuid::new_v4();
        let filter = ChangeFilter::conversation_message_inserts(conv);
        assert!(filter.matches(&ChangeEvent::message_insert(&message_in(conv))));
        assert!(!filter.matches(&ChangeEvent::message_insert(&message_in(Uuid::new_v4()))));
    }

    #[tokio::test]
    async fn test_recv_skips_non_matching() {
        let (tx, _rx) = change_channel(16);
        let conv = Uuid::new_v4();
        let mut sub = Subscription::subscribe(&tx, ChangeFilter::conversation_message_inserts(conv));

        broadcast_change(&tx, ChangeEvent::message_insert(&message_in(Uuid::new_v4())));
        let wanted = message_in(conv);
        broadcast_change(&tx, ChangeEvent::message_insert(&wanted));

        let got = sub.recv().await.expect("subscription should yield an event");
        assert_eq!(got.decode_message(), Some(wanted));
    }

    #[tokio::test]
    async fn test_recv_ends_on_close() {
        let (tx, _rx) = change_channel(16);
        let mut sub = Subscription::subscribe(&tx, ChangeFilter::message_inserts());
        drop(tx);
        drop(_rx);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_into_stream_yields_matching() {
        let (tx, _rx) = change_channel(16);
        let conv = Uuid::new_v4();
        let sub = Subscription::subscribe(&tx, ChangeFilter::conversation_message_inserts(conv));
        let mut stream = Box::pin(sub.into_stream());

        broadcast_change(&tx, ChangeEvent::message_insert(&message_in(conv)));
        let got = stream.next().await.expect("stream should yield");
        assert!(got.decode_message().is_some());
    }
}
