//! Row-Change Events
//!
//! Payloads carried by the push channel. The channel delivers row-change
//! events (insert/update/delete) per relation, at-least-once, with no
//! ordering guarantee across subscriptions. Payloads are JSON and are decoded
//! into typed rows at the consuming boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::messaging::MessageRow;

/// Relations the messaging core observes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Conversations,
    ConversationParticipants,
    Messages,
    Profiles,
}

/// Kind of row change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A row-change event delivered over the push channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    /// What happened
    pub op: ChangeOp,
    /// Which relation changed
    pub relation: Relation,
    /// The affected row as JSON (shape depends on the relation)
    pub payload: serde_json::Value,
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create a new change event
    pub fn new(op: ChangeOp, relation: Relation, payload: serde_json::Value) -> Self {
        Self {
            op,
            relation,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Event for a freshly-stored message
    pub fn message_insert(row: &MessageRow) -> Self {
        let payload = serde_json::to_value(row).unwrap_or(serde_json::Value::Null);
        Self::new(ChangeOp::Insert, Relation::Messages, payload)
    }

    /// Event for a newly-created conversation
    pub fn conversation_insert(conversation_id: Uuid) -> Self {
        Self::new(
            ChangeOp::Insert,
            Relation::Conversations,
            serde_json::json!({ "id": conversation_id }),
        )
    }

    /// Event for a deleted conversation
    pub fn conversation_delete(conversation_id: Uuid) -> Self {
        Self::new(
            ChangeOp::Delete,
            Relation::Conversations,
            serde_json::json!({ "id": conversation_id }),
        )
    }

    /// Decode the payload as a message row
    ///
    /// Returns `None` for non-message events or payloads that do not parse;
    /// consumers must tolerate foreign payloads on an at-least-once channel.
    pub fn decode_message(&self) -> Option<MessageRow> {
        if self.relation != Relation::Messages {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}
