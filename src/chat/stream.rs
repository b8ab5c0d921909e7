//! Message Stream
//!
//! The ordered message history of one open conversation plus its live
//! append feed. Opening fetches the full ascending history, marks the
//! conversation seen (session cleared-set + bulk read-write through the
//! tracker), and subscribes to insert events for this conversation.
//!
//! Incoming events from self are ignored: the optimistic path already
//! appended that message, and the at-least-once channel would otherwise
//! render it twice. Messages from the peer are appended in receipt order
//! (weak ordering under network jitter is accepted) and marked read on
//! arrival, since the conversation is open on screen.
//!
//! Every completion re-checks the session's open pointer before touching
//! shared state, so a fetch that resolves after navigation cannot write
//! into a conversation the user has left.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::realtime::{ChangeBroadcast, ChangeFilter, Subscription};
use crate::shared::messaging::{ProfileSnapshot, StreamMessage};
use crate::shared::ChatError;
use crate::store::MessagingStore;

use super::directory::ConversationDirectory;
use super::read_state::ReadStateTracker;
use super::send::OptimisticSendPipeline;
use super::session::ConversationSession;

/// One open conversation: history, live feed, and the send operation
pub struct MessageStream {
    conversation_id: Uuid,
    messages: Arc<Mutex<Vec<StreamMessage>>>,
    pipeline: OptimisticSendPipeline,
    feed_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}

impl MessageStream {
    /// Open a conversation: fetch history, mark it seen, start the live feed
    #[allow(clippy::too_many_arguments)]
    pub async fn open(
        store: Arc<dyn MessagingStore>,
        changes: &ChangeBroadcast,
        session: Arc<ConversationSession>,
        tracker: Arc<ReadStateTracker>,
        directory: Arc<ConversationDirectory>,
        self_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Self, ChatError> {
        if !store.is_participant(self_id, conversation_id).await? {
            return Err(ChatError::NotAParticipant {
                user_id: self_id,
                conversation_id,
            });
        }

        session.set_open(conversation_id);
        session.mark_cleared(conversation_id);

        // Subscribe before the history fetch: the broadcast does not replay,
        // so a message inserted between snapshot and subscription would
        // otherwise be lost until reopen. The feed dedupes the overlap.
        let subscription = Subscription::subscribe(
            changes,
            ChangeFilter::conversation_message_inserts(conversation_id),
        );

        let history = store.messages_for_conversation(conversation_id).await?;

        // one profile fetch per distinct sender (two at most)
        let mut profiles: HashMap<Uuid, Option<ProfileSnapshot>> = HashMap::new();
        for row in &history {
            if !profiles.contains_key(&row.sender_id) {
                let profile = store.profile(row.sender_id).await.unwrap_or_else(|e| {
                    tracing::warn!("[Chat] Profile fetch failed for {}: {}", row.sender_id, e);
                    None
                });
                profiles.insert(row.sender_id, profile);
            }
        }
        let self_profile = match profiles.get(&self_id) {
            Some(profile) => profile.clone(),
            None => store.profile(self_id).await.unwrap_or(None),
        };

        let messages: Vec<StreamMessage> = history
            .into_iter()
            .map(|row| {
                let sender = profiles.get(&row.sender_id).cloned().flatten();
                StreamMessage::confirmed(row, sender)
            })
            .collect();
        let messages = Arc::new(Mutex::new(messages));

        // bulk mark-as-read; gates the directory's trust in server counts
        tracker.begin_marking(store.clone(), conversation_id, self_id);

        let feed_task = Self::spawn_feed_task(
            store.clone(),
            subscription,
            session.clone(),
            tracker,
            directory.clone(),
            messages.clone(),
            self_id,
            conversation_id,
        );

        let pipeline = OptimisticSendPipeline::new(
            store,
            session,
            directory,
            messages.clone(),
            self_profile,
            self_id,
            conversation_id,
        );

        tracing::info!("[Chat] Opened conversation {}", conversation_id);
        Ok(Self {
            conversation_id,
            messages,
            pipeline,
            feed_task: Some(feed_task),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_feed_task(
        store: Arc<dyn MessagingStore>,
        mut subscription: Subscription,
        session: Arc<ConversationSession>,
        tracker: Arc<ReadStateTracker>,
        directory: Arc<ConversationDirectory>,
        messages: Arc<Mutex<Vec<StreamMessage>>>,
        self_id: Uuid,
        conversation_id: Uuid,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let Some(row) = event.decode_message() else {
                    continue;
                };

                // self-echo: already present via the optimistic path
                if row.sender_id == self_id {
                    continue;
                }

                // the history snapshot may already hold this row, and the
                // channel is at-least-once
                let already_present = messages
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .iter()
                    .any(|m| m.row.id == row.id);
                if already_present {
                    continue;
                }

                let sender = store.profile(row.sender_id).await.unwrap_or_else(|e| {
                    tracing::warn!("[Chat] Profile fetch failed for {}: {}", row.sender_id, e);
                    None
                });

                // the profile fetch suspended; the user may have navigated away
                if !session.is_open(conversation_id) {
                    tracing::debug!(
                        "[Chat] Dropping stale message event for closed conversation {}",
                        conversation_id
                    );
                    continue;
                }

                messages
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(StreamMessage::confirmed(row.clone(), sender));
                directory.apply_local_message(&row);

                // open on screen means seen on arrival
                if let Err(e) = store.mark_message_read(row.id).await {
                    tracing::warn!("[Chat] Per-message read-mark failed for {}: {}", row.id, e);
                }
                tracker.note_arrival(conversation_id);
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StreamMessage>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The conversation this stream is open on
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// Current ordered message list
    pub fn messages(&self) -> Vec<StreamMessage> {
        self.lock().clone()
    }

    /// Send a message into this conversation (optimistic)
    pub async fn send(&self, content: &str) -> Result<crate::shared::messaging::MessageRow, ChatError> {
        self.pipeline.send(content).await
    }

    /// Stop the live feed; no other cleanup
    pub fn close(&mut self) {
        if let Some(task) = self.feed_task.take() {
            task.abort();
            tracing::debug!("[Chat] Closed live feed for {}", self.conversation_id);
        }
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        self.close();
    }
}
