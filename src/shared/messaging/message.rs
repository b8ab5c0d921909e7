//! Message Data Structures
//!
//! Typed row shapes for the `messages` relation plus the in-memory form a
//! message takes while a conversation is open (provisional or confirmed).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::ProfileSnapshot;

/// A persisted message row as returned by the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRow {
    /// Unique message ID (server-assigned)
    pub id: Uuid,
    /// Conversation this message belongs to
    pub conversation_id: Uuid,
    /// User who sent the message
    pub sender_id: Uuid,
    /// Message text; immutable after creation
    pub content: String,
    /// Server-assigned creation time, monotonic within a conversation
    pub created_at: DateTime<Utc>,
    /// Whether the recipient has read the message; flips false -> true only
    pub read: bool,
}

impl MessageRow {
    /// Get a preview of the message (first N characters, char-boundary safe)
    pub fn preview(&self, max_len: usize) -> String {
        if self.content.chars().count() <= max_len {
            self.content.clone()
        } else {
            let mut preview: String = self
                .content
                .chars()
                .take(max_len.saturating_sub(3))
                .collect();
            preview.push_str("...");
            preview
        }
    }
}

/// Fields the caller supplies when inserting a message; the store assigns
/// `id` and `created_at` and initializes `read` to false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
}

/// Delivery state of a message held by an open stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryState {
    /// Applied locally, awaiting server confirmation
    Pending,
    /// Backed by a server-confirmed row
    Confirmed,
}

/// A message as held by an open `MessageStream`
///
/// `local_id` is the reconciliation key: a temporary v4 id while pending,
/// replaced by the authoritative server id on confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    /// Local key for reconciliation
    pub local_id: Uuid,
    /// Row data; provisional values until confirmed
    pub row: MessageRow,
    /// Sender profile snapshot, when one could be fetched
    pub sender: Option<ProfileSnapshot>,
    /// Pending or confirmed
    pub delivery: DeliveryState,
}

impl StreamMessage {
    /// Construct a provisional message with a temporary local id and a
    /// locally-assigned timestamp
    pub fn provisional(
        conversation_id: Uuid,
        sender_id: Uuid,
        content: String,
        sender: Option<ProfileSnapshot>,
    ) -> Self {
        let local_id = Uuid::new_v4();
        Self {
            local_id,
            row: MessageRow {
                id: local_id,
                conversation_id,
                sender_id,
                content,
                created_at: Utc::now(),
                read: false,
            },
            sender,
            delivery: DeliveryState::Pending,
        }
    }

    /// Wrap a server-confirmed row
    pub fn confirmed(row: MessageRow, sender: Option<ProfileSnapshot>) -> Self {
        Self {
            local_id: row.id,
            row,
            sender,
            delivery: DeliveryState::Confirmed,
        }
    }

    /// Replace provisional data with the server-returned row
    pub fn confirm(&mut self, row: MessageRow) {
        self.local_id = row.id;
        self.row = row;
        self.delivery = DeliveryState::Confirmed;
    }

    /// Whether this message is still awaiting confirmation
    pub fn is_pending(&self) -> bool {
        self.delivery == DeliveryState::Pending
    }
}
