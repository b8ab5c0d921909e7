//! Conversation Data Structures
//!
//! Typed rows for the `conversations` and `conversation_participants`
//! relations, plus the derived per-viewer summary the directory produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::MessageRow;
use super::profile::ProfileSnapshot;

/// A persisted conversation row
///
/// Invariant: at most one conversation exists per unordered pair of
/// participants (enforced server-side on the primary creation path).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationRow {
    /// Unique conversation ID
    pub id: Uuid,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// Bumped whenever a message is stored
    pub updated_at: DateTime<Utc>,
}

/// A user's membership in a conversation; each conversation has exactly two
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantRow {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

/// Get the other participant of a 1:1 conversation
pub fn other_user(participants: &[ParticipantRow], viewer_id: Uuid) -> Option<Uuid> {
    participants
        .iter()
        .find(|p| p.user_id != viewer_id)
        .map(|p| p.user_id)
}

/// Derived, per-viewer view of one conversation; recomputed, never persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    /// The conversation this summarizes
    pub conversation_id: Uuid,
    /// The other participant's profile snapshot, when available
    pub other: Option<ProfileSnapshot>,
    /// Most recent message, if any
    pub last_message: Option<MessageRow>,
    /// Preview text of the most recent message
    pub last_message_preview: String,
    /// Messages with read=false sent by the other participant
    pub unread_count: u32,
    /// Ordering key for the directory (descending)
    pub updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    /// Patch this summary in place for a message just sent or received in the
    /// open conversation. Does not touch `unread_count`; the caller owns the
    /// zero-override rules.
    pub fn apply_message(&mut self, message: &MessageRow, preview_len: usize) {
        self.last_message_preview = message.preview(preview_len);
        self.updated_at = message.created_at;
        self.last_message = Some(message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(conversation_id: Uuid, user_id: Uuid) -> ParticipantRow {
        ParticipantRow {
            conversation_id,
            user_id,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn test_other_user_picks_the_peer() {
        let conv = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let parts = vec![participant(conv, a), participant(conv, b)];
        assert_eq!(other_user(&parts, a), Some(b));
        assert_eq!(other_user(&parts, b), Some(a));
    }

    #[test]
    fn test_other_user_empty_participants() {
        assert_eq!(other_user(&[], Uuid::new_v4()), None);
    }

    #[test]
    fn test_apply_message_updates_preview_and_order_key() {
        let conv = Uuid::new_v4();
        let mut summary = ConversationSummary {
            conversation_id: conv,
            other: None,
            last_message: None,
            last_message_preview: String::new(),
            unread_count: 3,
            updated_at: Utc::now() - chrono::Duration::hours(1),
        };

        let message = MessageRow {
            id: Uuid::new_v4(),
            conversation_id: conv,
            sender_id: Uuid::new_v4(),
            content: "Buen Camino".to_string(),
            created_at: Utc::now(),
            read: false,
        };

        summary.apply_message(&message, 80);
        assert_eq!(summary.last_message_preview, "Buen Camino");
        assert_eq!(summary.updated_at, message.created_at);
        assert_eq!(summary.last_message.as_ref().map(|m| m.id), Some(message.id));
        // unread bookkeeping is owned by the directory
        assert_eq!(summary.unread_count, 3);
    }
}
