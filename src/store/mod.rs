//! Store Boundary
//!
//! The persistent relational store is an external collaborator; this module
//! defines the typed seam the messaging core consumes it through, scoped to
//! four relations: `conversations`, `conversation_participants`, `messages`,
//! and `profiles`.
//!
//! Two implementations live here: [`postgres::PostgresStore`] (sqlx) and
//! [`memory::MemoryStore`] (tests and local runs). Both emit row-change
//! events on a shared [`crate::realtime::ChangeBroadcast`] after successful
//! writes, standing in for the platform's push channel.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::shared::messaging::{
    ConversationRow, MessageRow, NewMessage, ParticipantRow, ProfileSnapshot,
};
pub use crate::shared::StoreError;

/// Typed operations the messaging core needs from the relational store
#[async_trait]
pub trait MessagingStore: Send + Sync {
    /// IDs of every conversation the user participates in
    async fn conversation_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// Among `candidates`, find one conversation `other_id` participates in
    async fn find_shared_conversation(
        &self,
        candidates: &[Uuid],
        other_id: Uuid,
    ) -> Result<Option<Uuid>, StoreError>;

    /// Idempotent creation primitive: return the one conversation for this
    /// unordered pair, creating it (with both participant rows) if absent.
    /// Stores without the primitive return [`StoreError::Unsupported`] and
    /// callers fall back to [`Self::insert_conversation`] +
    /// [`Self::insert_participants`].
    async fn create_conversation_for_pair(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Uuid, StoreError>;

    /// Fallback path, step 1: bare conversation row
    async fn insert_conversation(&self) -> Result<ConversationRow, StoreError>;

    /// Fallback path, step 2: both participant rows
    async fn insert_participants(
        &self,
        conversation_id: Uuid,
        user_ids: [Uuid; 2],
    ) -> Result<(), StoreError>;

    /// Fetch one conversation row
    async fn conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<ConversationRow>, StoreError>;

    /// Participant rows of a conversation
    async fn participants(&self, conversation_id: Uuid) -> Result<Vec<ParticipantRow>, StoreError>;

    /// Whether the user participates in the conversation
    async fn is_participant(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<bool, StoreError> {
        let participants = self.participants(conversation_id).await?;
        Ok(participants.iter().any(|p| p.user_id == user_id))
    }

    /// Full message history, ascending by creation time
    async fn messages_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageRow>, StoreError>;

    /// Most recent message of a conversation, if any
    async fn latest_message(&self, conversation_id: Uuid)
        -> Result<Option<MessageRow>, StoreError>;

    /// Messages with read=false not sent by `viewer_id`
    async fn unread_count(&self, conversation_id: Uuid, viewer_id: Uuid)
        -> Result<u32, StoreError>;

    /// Persist a message; the store assigns id and timestamp and bumps the
    /// conversation's `updated_at`
    async fn insert_message(&self, new: NewMessage) -> Result<MessageRow, StoreError>;

    /// Bulk flip read=true on every unread message in the conversation not
    /// sent by `reader_id`; returns the number of rows affected
    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> Result<u64, StoreError>;

    /// Flip read=true on a single message
    async fn mark_message_read(&self, message_id: Uuid) -> Result<(), StoreError>;

    /// Profile snapshot of a user, if one exists
    async fn profile(&self, user_id: Uuid) -> Result<Option<ProfileSnapshot>, StoreError>;

    /// Delete a conversation and everything it owns: messages, then
    /// participants, then the conversation row (FK-safe order)
    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), StoreError>;
}
