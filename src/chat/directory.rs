//! Conversation Directory
//!
//! Maintains the signed-in user's conversation list: other participant's
//! profile snapshot, last-message preview, and unread count, ordered by
//! `updated_at` descending.
//!
//! Unread counts are overridden to zero for any conversation the user has
//! cleared this session, the currently-open conversation, and conversations
//! whose mark-as-read write is still inside its suppression window. The
//! server count may lag; the user has already seen those messages.
//!
//! Invalidation is coarse: any insert on the global message relation
//! triggers a full refresh. Local sends and receives in the open
//! conversation patch the matching summary in place instead.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::realtime::{ChangeBroadcast, ChangeFilter, Subscription};
use crate::shared::messaging::{other_user, ConversationSummary, MessageRow};
use crate::shared::{ChatConfig, ChatError};
use crate::store::MessagingStore;

use super::read_state::ReadStateTracker;
use super::session::ConversationSession;

/// Per-viewer conversation list with summaries
pub struct ConversationDirectory {
    store: Arc<dyn MessagingStore>,
    session: Arc<ConversationSession>,
    tracker: Arc<ReadStateTracker>,
    changes: ChangeBroadcast,
    config: ChatConfig,
    self_id: Uuid,
    summaries: Mutex<Vec<ConversationSummary>>,
}

impl ConversationDirectory {
    pub fn new(
        store: Arc<dyn MessagingStore>,
        session: Arc<ConversationSession>,
        tracker: Arc<ReadStateTracker>,
        changes: ChangeBroadcast,
        config: ChatConfig,
        self_id: Uuid,
    ) -> Self {
        Self {
            store,
            session,
            tracker,
            changes,
            config,
            self_id,
            summaries: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConversationSummary>> {
        self.summaries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Refresh from the store and return the current summaries
    pub async fn list(&self) -> Result<Vec<ConversationSummary>, ChatError> {
        self.refresh().await?;
        Ok(self.summaries())
    }

    /// Last refreshed summaries without touching the store
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.lock().clone()
    }

    /// Whether the unread count must be forced to zero locally
    fn unread_override(&self, conversation_id: Uuid) -> bool {
        self.session.is_cleared(conversation_id)
            || self.session.is_open(conversation_id)
            || self.tracker.is_suppressed(conversation_id)
    }

    /// Rebuild every summary from the store
    pub async fn refresh(&self) -> Result<(), ChatError> {
        let ids = self.store.conversation_ids_for_user(self.self_id).await?;

        let mut fresh = Vec::with_capacity(ids.len());
        for conversation_id in ids {
            let Some(conversation) = self.store.conversation(conversation_id).await? else {
                // deleted between the id fetch and here; skip
                continue;
            };

            let participants = self.store.participants(conversation_id).await?;
            let other = match other_user(&participants, self.self_id) {
                Some(other_id) => self.store.profile(other_id).await?,
                None => None,
            };

            let last_message = self.store.latest_message(conversation_id).await?;
            let unread_count = if self.unread_override(conversation_id) {
                0
            } else {
                self.store.unread_count(conversation_id, self.self_id).await?
            };

            let last_message_preview = last_message
                .as_ref()
                .map(|m| m.preview(self.config.preview_length))
                .unwrap_or_default();
            let updated_at = conversation.updated_at;

            fresh.push(ConversationSummary {
                conversation_id,
                other,
                last_message,
                last_message_preview,
                unread_count,
                updated_at,
            });
        }

        // A send can confirm and patch the cached list while this refresh is
        // mid-flight; its snapshot would then be older than the patch. Keep
        // the cached summary wherever it is newer than the refetched one.
        let mut summaries = self.lock();
        for summary in fresh.iter_mut() {
            if let Some(cached) = summaries
                .iter()
                .find(|s| s.conversation_id == summary.conversation_id)
            {
                if cached.updated_at > summary.updated_at {
                    *summary = cached.clone();
                }
            }
        }
        fresh.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        *summaries = fresh;
        Ok(())
    }

    /// Patch the matching summary for a message sent or received locally,
    /// keeping the list ordered, without a full refetch. A miss is fine;
    /// the next coarse refresh catches up.
    pub fn apply_local_message(&self, message: &MessageRow) {
        let mut summaries = self.lock();
        if let Some(summary) = summaries
            .iter_mut()
            .find(|s| s.conversation_id == message.conversation_id)
        {
            summary.apply_message(message, self.config.preview_length);
            summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        }
    }

    /// Coarse invalidation: refresh on every insert on the global message
    /// relation. Runs until the change broadcast closes or the task is
    /// aborted.
    pub fn spawn_invalidation_task(self: &Arc<Self>) -> JoinHandle<()> {
        let mut subscription = Subscription::subscribe(&self.changes, ChangeFilter::message_inserts());
        let directory = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(_event) = subscription.recv().await {
                tracing::debug!("[Directory] Message insert observed, refreshing summaries");
                if let Err(e) = directory.refresh().await {
                    tracing::warn!("[Directory] Refresh failed: {}", e);
                }
            }
        })
    }

    /// Delete a conversation and all local traces of it
    pub async fn delete(&self, conversation_id: Uuid) -> Result<(), ChatError> {
        self.store.delete_conversation(conversation_id).await?;

        self.session.clear_open_if(conversation_id);
        self.session.unmark_cleared(conversation_id);
        self.tracker.forget(conversation_id);
        self.lock().retain(|s| s.conversation_id != conversation_id);

        tracing::info!("[Directory] Deleted conversation {}", conversation_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::messaging::{NewMessage, ProfileSnapshot};
    use crate::store::memory::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        session: Arc<ConversationSession>,
        tracker: Arc<ReadStateTracker>,
        a: Uuid,
        b: Uuid,
    }

    fn fixture() -> Fixture {
        Fixture {
            store: Arc::new(MemoryStore::new()),
            session: Arc::new(ConversationSession::new()),
            tracker: Arc::new(ReadStateTracker::new(Duration::from_millis(500))),
            a: Uuid::new_v4(),
            b: Uuid::new_v4(),
        }
    }

    fn directory(f: &Fixture) -> Arc<ConversationDirectory> {
        Arc::new(ConversationDirectory::new(
            f.store.clone(),
            f.session.clone(),
            f.tracker.clone(),
            f.store.changes(),
            ChatConfig::default(),
            f.a,
        ))
    }

    async fn send(f: &Fixture, conv: Uuid, sender: Uuid, content: &str) -> MessageRow {
        f.store
            .insert_message(NewMessage {
                conversation_id: conv,
                sender_id: sender,
                content: content.to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_orders_by_recency() {
        let f = fixture();
        let c = Uuid::new_v4();
        let conv_ab = f.store.create_conversation_for_pair(f.a, f.b).await.unwrap();
        let conv_ac = f.store.create_conversation_for_pair(f.a, c).await.unwrap();

        send(&f, conv_ab, f.b, "first").await;
        send(&f, conv_ac, c, "second").await;

        let dir = directory(&f);
        let list = dir.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].conversation_id, conv_ac);
        assert_eq!(list[1].conversation_id, conv_ab);
    }

    #[tokio::test]
    async fn test_list_reports_unread_and_preview() {
        let f = fixture();
        f.store.insert_profile(ProfileSnapshot::new(f.b, "Marta", "@marta"));
        let conv = f.store.create_conversation_for_pair(f.a, f.b).await.unwrap();
        send(&f, conv, f.b, "hola").await;
        send(&f, conv, f.b, "¿dónde estás?").await;

        let dir = directory(&f);
        let list = dir.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].unread_count, 2);
        assert_eq!(list[0].last_message_preview, "¿dónde estás?");
        assert_eq!(
            list[0].other.as_ref().map(|p| p.display_name.as_str()),
            Some("Marta")
        );
    }

    #[tokio::test]
    async fn test_unread_forced_zero_for_open_conversation() {
        let f = fixture();
        let conv = f.store.create_conversation_for_pair(f.a, f.b).await.unwrap();
        send(&f, conv, f.b, "hola").await;

        f.session.set_open(conv);
        let dir = directory(&f);
        let list = dir.list().await.unwrap();
        assert_eq!(list[0].unread_count, 0);
    }

    #[tokio::test]
    async fn test_unread_forced_zero_for_cleared_conversation() {
        let f = fixture();
        let conv = f.store.create_conversation_for_pair(f.a, f.b).await.unwrap();
        send(&f, conv, f.b, "hola").await;

        f.session.mark_cleared(conv);
        let dir = directory(&f);
        let list = dir.list().await.unwrap();
        assert_eq!(list[0].unread_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unread_forced_zero_while_suppressed_then_trusted() {
        let f = fixture();
        let conv = f.store.create_conversation_for_pair(f.a, f.b).await.unwrap();
        send(&f, conv, f.b, "hola").await;

        // arm the window without the write: simulates replication lag where
        // the server still reports a stale nonzero count
        f.tracker.note_arrival(conv);
        let dir = directory(&f);
        assert_eq!(dir.list().await.unwrap()[0].unread_count, 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(dir.list().await.unwrap()[0].unread_count, 1);
    }

    #[tokio::test]
    async fn test_apply_local_message_patches_and_reorders() {
        let f = fixture();
        let c = Uuid::new_v4();
        let conv_ab = f.store.create_conversation_for_pair(f.a, f.b).await.unwrap();
        let conv_ac = f.store.create_conversation_for_pair(f.a, c).await.unwrap();
        send(&f, conv_ab, f.a, "old").await;
        send(&f, conv_ac, f.a, "newer").await;

        let dir = directory(&f);
        dir.refresh().await.unwrap();
        assert_eq!(dir.summaries()[0].conversation_id, conv_ac);

        let row = send(&f, conv_ab, f.a, "Buen Camino").await;
        dir.apply_local_message(&row);

        let summaries = dir.summaries();
        assert_eq!(summaries[0].conversation_id, conv_ab);
        assert_eq!(summaries[0].last_message_preview, "Buen Camino");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_task_refreshes_on_insert() {
        let f = fixture();
        let conv = f.store.create_conversation_for_pair(f.a, f.b).await.unwrap();

        let dir = directory(&f);
        dir.refresh().await.unwrap();
        assert_eq!(dir.summaries()[0].last_message_preview, "");

        let task = dir.spawn_invalidation_task();
        send(&f, conv, f.b, "hola").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(dir.summaries()[0].last_message_preview, "hola");
        task.abort();
    }

    #[tokio::test]
    async fn test_refresh_keeps_a_newer_local_patch() {
        let f = fixture();
        let conv = f.store.create_conversation_for_pair(f.a, f.b).await.unwrap();
        send(&f, conv, f.a, "old").await;

        let dir = directory(&f);
        dir.refresh().await.unwrap();

        // a send confirms with a row the refresh snapshot has not seen yet
        let unseen = MessageRow {
            id: Uuid::new_v4(),
            conversation_id: conv,
            sender_id: f.a,
            content: "confirmed mid-refresh".to_string(),
            created_at: chrono::Utc::now() + chrono::Duration::seconds(5),
            read: false,
        };
        dir.apply_local_message(&unseen);

        dir.refresh().await.unwrap();
        let summaries = dir.summaries();
        assert_eq!(summaries[0].last_message_preview, "confirmed mid-refresh");
        assert_eq!(summaries[0].updated_at, unseen.created_at);
    }

    #[tokio::test]
    async fn test_delete_removes_everything() {
        let f = fixture();
        let conv = f.store.create_conversation_for_pair(f.a, f.b).await.unwrap();
        send(&f, conv, f.b, "hola").await;
        f.session.set_open(conv);
        f.session.mark_cleared(conv);

        let dir = directory(&f);
        dir.refresh().await.unwrap();
        dir.delete(conv).await.unwrap();

        assert!(dir.summaries().is_empty());
        assert_eq!(f.session.open_conversation(), None);
        assert!(!f.session.is_cleared(conv));
        assert!(dir.list().await.unwrap().is_empty());
    }
}
