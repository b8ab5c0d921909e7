//! Conversation Resolver
//!
//! Maps an unordered pair of users to their single conversation, creating it
//! on first contact. Idempotent and safe under concurrent invocation by
//! either participant on the primary path; the multi-step fallback keeps a
//! documented race window when the store lacks the idempotent primitive.

use std::sync::Arc;
use uuid::Uuid;

use crate::shared::{ChatError, StoreError};
use crate::store::MessagingStore;

/// Resolves the conversation between two users
pub struct ConversationResolver {
    store: Arc<dyn MessagingStore>,
}

impl ConversationResolver {
    pub fn new(store: Arc<dyn MessagingStore>) -> Self {
        Self { store }
    }

    /// Resolve the conversation for `(self_id, other_id)`, creating it if absent
    ///
    /// The common case is a pure read: an existing shared conversation is
    /// returned without any write. Creation goes through the store's
    /// idempotent pair primitive; if the store reports it unsupported, the
    /// direct multi-step path (conversation row, then both participants) is
    /// used instead, accepting its race window.
    pub async fn resolve(&self, self_id: Uuid, other_id: Uuid) -> Result<Uuid, ChatError> {
        let mine = self.store.conversation_ids_for_user(self_id).await?;
        if !mine.is_empty() {
            if let Some(existing) = self.store.find_shared_conversation(&mine, other_id).await? {
                tracing::debug!("[Resolver] Found existing conversation {}", existing);
                return Ok(existing);
            }
        }

        match self.store.create_conversation_for_pair(self_id, other_id).await {
            Ok(id) => {
                tracing::info!("[Resolver] Created conversation {} for pair", id);
                Ok(id)
            }
            Err(StoreError::Unsupported { operation }) => {
                tracing::debug!(
                    "[Resolver] Store lacks {}, using multi-step fallback",
                    operation
                );
                self.resolve_fallback(self_id, other_id).await
            }
            Err(e) => Err(ChatError::creation_failed(e)),
        }
    }

    async fn resolve_fallback(&self, self_id: Uuid, other_id: Uuid) -> Result<Uuid, ChatError> {
        let conversation = self
            .store
            .insert_conversation()
            .await
            .map_err(ChatError::creation_failed)?;
        self.store
            .insert_participants(conversation.id, [self_id, other_id])
            .await
            .map_err(ChatError::creation_failed)?;
        tracing::info!(
            "[Resolver] Created conversation {} via fallback path",
            conversation.id
        );
        Ok(conversation.id)
    }
}
