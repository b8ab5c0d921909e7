//! Chat Client Facade
//!
//! Bundles the store, change broadcast, session state, read-state tracker,
//! and directory behind the operations the UI layer consumes:
//! `resolve_or_create`, `conversations`, `open`, `mark_read`, `delete`.
//! `send` lives on the opened [`MessageStream`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::realtime::ChangeBroadcast;
use crate::shared::messaging::ConversationSummary;
use crate::shared::{ChatConfig, ChatError};
use crate::store::MessagingStore;

use super::directory::ConversationDirectory;
use super::read_state::ReadStateTracker;
use super::resolver::ConversationResolver;
use super::session::ConversationSession;
use super::stream::MessageStream;

/// Messaging core for one signed-in user
pub struct ChatClient {
    store: Arc<dyn MessagingStore>,
    changes: ChangeBroadcast,
    session: Arc<ConversationSession>,
    tracker: Arc<ReadStateTracker>,
    directory: Arc<ConversationDirectory>,
    resolver: ConversationResolver,
    self_id: Uuid,
}

impl ChatClient {
    /// Build a client over a store and its change broadcast
    pub fn new(
        store: Arc<dyn MessagingStore>,
        changes: ChangeBroadcast,
        self_id: Uuid,
        config: ChatConfig,
    ) -> Self {
        let session = Arc::new(ConversationSession::new());
        let tracker = Arc::new(ReadStateTracker::new(config.suppression_window));
        let directory = Arc::new(ConversationDirectory::new(
            store.clone(),
            session.clone(),
            tracker.clone(),
            changes.clone(),
            config,
            self_id,
        ));
        let resolver = ConversationResolver::new(store.clone());

        Self {
            store,
            changes,
            session,
            tracker,
            directory,
            resolver,
            self_id,
        }
    }

    /// The signed-in user
    pub fn self_id(&self) -> Uuid {
        self.self_id
    }

    /// Session-local state (open pointer, cleared set, draft)
    pub fn session(&self) -> Arc<ConversationSession> {
        self.session.clone()
    }

    /// The conversation directory
    pub fn directory(&self) -> Arc<ConversationDirectory> {
        self.directory.clone()
    }

    /// Start the directory's coarse invalidation task
    pub fn spawn_directory_invalidation(&self) -> JoinHandle<()> {
        self.directory.spawn_invalidation_task()
    }

    /// The one conversation between self and `other_id`, created if absent
    pub async fn resolve_or_create(&self, other_id: Uuid) -> Result<Uuid, ChatError> {
        self.resolver.resolve(self.self_id, other_id).await
    }

    /// Conversation summaries ordered by recency
    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>, ChatError> {
        self.directory.list().await
    }

    /// Open a conversation: history plus live feed
    pub async fn open(&self, conversation_id: Uuid) -> Result<MessageStream, ChatError> {
        MessageStream::open(
            self.store.clone(),
            &self.changes,
            self.session.clone(),
            self.tracker.clone(),
            self.directory.clone(),
            self.self_id,
            conversation_id,
        )
        .await
    }

    /// Explicitly mark a conversation read (fire-and-forget)
    pub fn mark_read(&self, conversation_id: Uuid) {
        self.session.mark_cleared(conversation_id);
        self.tracker
            .begin_marking(self.store.clone(), conversation_id, self.self_id);
    }

    /// Delete a conversation, its participants, and its messages
    pub async fn delete(&self, conversation_id: Uuid) -> Result<(), ChatError> {
        self.directory.delete(conversation_id).await
    }
}
