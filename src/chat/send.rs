//! Optimistic Send Pipeline
//!
//! A sent message becomes visible immediately as a provisional entry with a
//! temporary id, then is reconciled with the server-confirmed row or rolled
//! back on failure, restoring the draft so the user can retry. Every
//! provisional message reaches exactly one of those two terminal states once
//! the insert settles.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::shared::messaging::{MessageRow, NewMessage, ProfileSnapshot, StreamMessage};
use crate::shared::ChatError;
use crate::store::MessagingStore;

use super::directory::ConversationDirectory;
use super::session::ConversationSession;

/// Sends messages into one open conversation
pub struct OptimisticSendPipeline {
    store: Arc<dyn MessagingStore>,
    session: Arc<ConversationSession>,
    directory: Arc<ConversationDirectory>,
    messages: Arc<Mutex<Vec<StreamMessage>>>,
    self_profile: Option<ProfileSnapshot>,
    self_id: Uuid,
    conversation_id: Uuid,
}

impl OptimisticSendPipeline {
    pub(crate) fn new(
        store: Arc<dyn MessagingStore>,
        session: Arc<ConversationSession>,
        directory: Arc<ConversationDirectory>,
        messages: Arc<Mutex<Vec<StreamMessage>>>,
        self_profile: Option<ProfileSnapshot>,
        self_id: Uuid,
        conversation_id: Uuid,
    ) -> Self {
        Self {
            store,
            session,
            directory,
            messages,
            self_profile,
            self_id,
            conversation_id,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StreamMessage>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send `content` into the open conversation
    ///
    /// Precondition violations (empty content, conversation no longer open)
    /// are rejected synchronously before any network operation. On insert
    /// failure the provisional entry is removed, the draft restored, and the
    /// error surfaced; local state is never left dangling.
    pub async fn send(&self, content: &str) -> Result<MessageRow, ChatError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if !self.session.is_open(self.conversation_id) {
            return Err(ChatError::NoOpenConversation);
        }

        let original_input = content.to_string();
        let provisional = StreamMessage::provisional(
            self.conversation_id,
            self.self_id,
            trimmed.to_string(),
            self.self_profile.clone(),
        );
        let local_id = provisional.local_id;

        self.lock().push(provisional);
        self.session.set_draft(String::new());

        let insert = self
            .store
            .insert_message(NewMessage {
                conversation_id: self.conversation_id,
                sender_id: self.self_id,
                content: trimmed.to_string(),
            })
            .await;

        match insert {
            Ok(row) => {
                // reconcile against the current list, not a snapshot
                let mut messages = self.lock();
                if let Some(message) = messages.iter_mut().find(|m| m.local_id == local_id) {
                    message.confirm(row.clone());
                }
                drop(messages);

                self.directory.apply_local_message(&row);
                tracing::debug!("[Send] Confirmed message {} in {}", row.id, row.conversation_id);
                Ok(row)
            }
            Err(e) => {
                self.lock().retain(|m| m.local_id != local_id);
                self.session.set_draft(original_input);
                tracing::warn!(
                    "[Send] Insert failed in {}, rolled back provisional message: {}",
                    self.conversation_id,
                    e
                );
                Err(ChatError::Store(e))
            }
        }
    }
}
