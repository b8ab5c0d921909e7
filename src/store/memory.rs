//! In-Memory Store
//!
//! HashMap-backed implementation of [`MessagingStore`] for tests and local
//! runs. Behaves like the hosted store: server-assigned ids and timestamps
//! (kept strictly monotonic per store), the idempotent pair-creation
//! primitive, and change events emitted after every successful write.
//!
//! Failure-injection knobs let tests exercise the rollback and fallback
//! paths deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::realtime::{broadcast_change, change_channel, ChangeBroadcast};
use crate::shared::messaging::{
    ConversationRow, MessageRow, NewMessage, ParticipantRow, ProfileSnapshot,
};
use crate::shared::ChangeEvent;

use super::{MessagingStore, StoreError};

struct Tables {
    conversations: HashMap<Uuid, ConversationRow>,
    /// Normalized (low, high) pair -> conversation id; backs the idempotent
    /// creation primitive. Fallback-created conversations are not indexed,
    /// which reproduces the documented fallback race window.
    pair_index: HashMap<(Uuid, Uuid), Uuid>,
    participants: Vec<ParticipantRow>,
    messages: Vec<MessageRow>,
    profiles: HashMap<Uuid, ProfileSnapshot>,
    /// Last issued timestamp; bumped to keep created_at strictly increasing
    last_ts: DateTime<Utc>,
}

impl Tables {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = if now <= self.last_ts {
            self.last_ts + Duration::microseconds(1)
        } else {
            now
        };
        self.last_ts = ts;
        ts
    }
}

/// In-memory [`MessagingStore`]
pub struct MemoryStore {
    inner: Mutex<Tables>,
    changes: ChangeBroadcast,
    fail_next_message_insert: AtomicBool,
    pair_primitive_enabled: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _rx) = change_channel(256);
        Self {
            inner: Mutex::new(Tables {
                conversations: HashMap::new(),
                pair_index: HashMap::new(),
                participants: Vec::new(),
                messages: Vec::new(),
                profiles: HashMap::new(),
                last_ts: Utc::now(),
            }),
            changes,
            fail_next_message_insert: AtomicBool::new(false),
            pair_primitive_enabled: AtomicBool::new(true),
        }
    }

    /// Sender half of this store's change broadcast
    pub fn changes(&self) -> ChangeBroadcast {
        self.changes.clone()
    }

    /// Seed a profile row
    pub fn insert_profile(&self, profile: ProfileSnapshot) {
        self.lock().profiles.insert(profile.user_id, profile);
    }

    /// Make the next `insert_message` fail with a query error
    pub fn fail_next_message_insert(&self) {
        self.fail_next_message_insert.store(true, Ordering::SeqCst);
    }

    /// Report `Unsupported` from the pair-creation primitive, forcing
    /// callers onto the multi-step fallback path
    pub fn disable_pair_primitive(&self) {
        self.pair_primitive_enabled.store(false, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[async_trait]
impl MessagingStore for MemoryStore {
    async fn conversation_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let tables = self.lock();
        let mut ids: Vec<Uuid> = tables
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.conversation_id)
            .collect();
        // participant rows are a flat Vec, so duplicate memberships (e.g. a
        // repeated fallback insert) would show up here; dedup needs the sort
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn find_shared_conversation(
        &self,
        candidates: &[Uuid],
        other_id: Uuid,
    ) -> Result<Option<Uuid>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .participants
            .iter()
            .find(|p| p.user_id == other_id && candidates.contains(&p.conversation_id))
            .map(|p| p.conversation_id))
    }

    async fn create_conversation_for_pair(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Uuid, StoreError> {
        if !self.pair_primitive_enabled.load(Ordering::SeqCst) {
            return Err(StoreError::unsupported("create_conversation_for_pair"));
        }

        let event;
        let id;
        {
            let mut tables = self.lock();
            let key = Self::pair_key(user_a, user_b);
            if let Some(existing) = tables.pair_index.get(&key) {
                return Ok(*existing);
            }

            let now = tables.next_timestamp();
            id = Uuid::new_v4();
            tables.conversations.insert(
                id,
                ConversationRow {
                    id,
                    created_at: now,
                    updated_at: now,
                },
            );
            for user_id in [user_a, user_b] {
                tables.participants.push(ParticipantRow {
                    conversation_id: id,
                    user_id,
                    joined_at: now,
                });
            }
            tables.pair_index.insert(key, id);
            event = ChangeEvent::conversation_insert(id);
        }
        broadcast_change(&self.changes, event);
        Ok(id)
    }

    async fn insert_conversation(&self) -> Result<ConversationRow, StoreError> {
        let row;
        {
            let mut tables = self.lock();
            let now = tables.next_timestamp();
            row = ConversationRow {
                id: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
            };
            tables.conversations.insert(row.id, row.clone());
        }
        broadcast_change(&self.changes, ChangeEvent::conversation_insert(row.id));
        Ok(row)
    }

    async fn insert_participants(
        &self,
        conversation_id: Uuid,
        user_ids: [Uuid; 2],
    ) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if !tables.conversations.contains_key(&conversation_id) {
            return Err(StoreError::not_found(format!(
                "conversation {}",
                conversation_id
            )));
        }
        let now = tables.next_timestamp();
        for user_id in user_ids {
            tables.participants.push(ParticipantRow {
                conversation_id,
                user_id,
                joined_at: now,
            });
        }
        Ok(())
    }

    async fn conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<ConversationRow>, StoreError> {
        Ok(self.lock().conversations.get(&conversation_id).cloned())
    }

    async fn participants(&self, conversation_id: Uuid) -> Result<Vec<ParticipantRow>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .participants
            .iter()
            .filter(|p| p.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn messages_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let tables = self.lock();
        let mut messages: Vec<MessageRow> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn latest_message(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<MessageRow>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn unread_count(
        &self,
        conversation_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<u32, StoreError> {
        let tables = self.lock();
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && !m.read && m.sender_id != viewer_id)
            .count() as u32)
    }

    async fn insert_message(&self, new: NewMessage) -> Result<MessageRow, StoreError> {
        if self.fail_next_message_insert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::query("injected insert failure"));
        }

        let row;
        {
            let mut tables = self.lock();
            if !tables.conversations.contains_key(&new.conversation_id) {
                return Err(StoreError::not_found(format!(
                    "conversation {}",
                    new.conversation_id
                )));
            }
            let created_at = tables.next_timestamp();
            row = MessageRow {
                id: Uuid::new_v4(),
                conversation_id: new.conversation_id,
                sender_id: new.sender_id,
                content: new.content,
                created_at,
                read: false,
            };
            tables.messages.push(row.clone());
            if let Some(conversation) = tables.conversations.get_mut(&new.conversation_id) {
                conversation.updated_at = created_at;
            }
        }
        broadcast_change(&self.changes, ChangeEvent::message_insert(&row));
        Ok(row)
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        let mut affected = 0u64;
        for message in tables.messages.iter_mut().filter(|m| {
            m.conversation_id == conversation_id && m.sender_id != reader_id && !m.read
        }) {
            message.read = true;
            affected += 1;
        }
        Ok(affected)
    }

    async fn mark_message_read(&self, message_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.lock();
        match tables.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.read = true;
                Ok(())
            }
            None => Err(StoreError::not_found(format!("message {}", message_id))),
        }
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<ProfileSnapshot>, StoreError> {
        Ok(self.lock().profiles.get(&user_id).cloned())
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), StoreError> {
        {
            let mut tables = self.lock();
            tables.messages.retain(|m| m.conversation_id != conversation_id);
            tables
                .participants
                .retain(|p| p.conversation_id != conversation_id);
            tables.conversations.remove(&conversation_id);
            tables.pair_index.retain(|_, id| *id != conversation_id);
        }
        broadcast_change(&self.changes, ChangeEvent::conversation_delete(conversation_id));
        Ok(())
    }
}
