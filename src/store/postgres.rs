//! Postgres Store
//!
//! sqlx-backed implementation of [`MessagingStore`]. The idempotent
//! pair-creation primitive relies on a unique constraint over the normalized
//! `(user_low, user_high)` pair, so concurrent resolution from either side
//! lands on the same row. Fallback-created conversations leave the pair
//! columns NULL and sit outside that constraint.
//!
//! Change events are emitted on the shared broadcast after successful
//! writes, standing in for the hosted store's push channel.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::realtime::{broadcast_change, ChangeBroadcast};
use crate::shared::messaging::{
    ConversationRow, MessageRow, NewMessage, ParticipantRow, ProfileSnapshot,
};
use crate::shared::ChangeEvent;

use super::{MessagingStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;

/// Postgres-backed [`MessagingStore`]
pub struct PostgresStore {
    pool: PgPool,
    changes: ChangeBroadcast,
}

impl PostgresStore {
    pub fn new(pool: PgPool, changes: ChangeBroadcast) -> Self {
        Self { pool, changes }
    }

    /// Sender half of this store's change broadcast
    pub fn changes(&self) -> ChangeBroadcast {
        self.changes.clone()
    }

    /// Normalize an unordered user pair to (low, high)
    pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Create the messaging tables if they do not exist
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id UUID PRIMARY KEY,
                user_low UUID,
                user_high UUID,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (user_low, user_high)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS conversation_participants (
                conversation_id UUID NOT NULL REFERENCES conversations(id),
                user_id UUID NOT NULL,
                joined_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (conversation_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id UUID PRIMARY KEY,
                conversation_id UUID NOT NULL REFERENCES conversations(id),
                sender_id UUID NOT NULL,
                content TEXT NOT NULL,
                is_read BOOLEAN NOT NULL DEFAULT false,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id UUID PRIMARY KEY,
                display_name TEXT NOT NULL,
                handle TEXT NOT NULL,
                avatar_url TEXT
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages (conversation_id, created_at)
            "#,
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn message_from_row(row: &sqlx::postgres::PgRow) -> MessageRow {
        MessageRow {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            sender_id: row.get("sender_id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
            read: row.get("is_read"),
        }
    }
}

#[async_trait]
impl MessagingStore for PostgresStore {
    async fn conversation_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT conversation_id FROM conversation_participants WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("conversation_id")).collect())
    }

    async fn find_shared_conversation(
        &self,
        candidates: &[Uuid],
        other_id: Uuid,
    ) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT conversation_id FROM conversation_participants
            WHERE user_id = $1 AND conversation_id = ANY($2)
            LIMIT 1
            "#,
        )
        .bind(other_id)
        .bind(candidates.to_vec())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("conversation_id")))
    }

    async fn create_conversation_for_pair(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Uuid, StoreError> {
        let (user_low, user_high) = Self::pair_key(user_a, user_b);
        let now = Utc::now();

        // The no-op DO UPDATE makes RETURNING yield the existing row on
        // conflict, so both racers get the same id.
        let row = sqlx::query(
            r#"
            INSERT INTO conversations (id, user_low, user_high, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (user_low, user_high)
            DO UPDATE SET updated_at = conversations.updated_at
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_low)
        .bind(user_high)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        let conversation_id: Uuid = row.get("id");

        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, user_id, joined_at)
            VALUES ($1, $2, $3), ($1, $4, $3)
            ON CONFLICT (conversation_id, user_id) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(user_low)
        .bind(now)
        .bind(user_high)
        .execute(&self.pool)
        .await?;

        broadcast_change(&self.changes, ChangeEvent::conversation_insert(conversation_id));
        Ok(conversation_id)
    }

    async fn insert_conversation(&self) -> Result<ConversationRow, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO conversations (id, created_at, updated_at)
            VALUES ($1, $2, $2)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        broadcast_change(&self.changes, ChangeEvent::conversation_insert(id));
        Ok(ConversationRow {
            id,
            created_at: now,
            updated_at: now,
        })
    }

    async fn insert_participants(
        &self,
        conversation_id: Uuid,
        user_ids: [Uuid; 2],
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, user_id, joined_at)
            VALUES ($1, $2, $3), ($1, $4, $3)
            "#,
        )
        .bind(conversation_id)
        .bind(user_ids[0])
        .bind(now)
        .bind(user_ids[1])
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<ConversationRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, created_at, updated_at FROM conversations WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ConversationRow {
            id: r.get("id"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn participants(&self, conversation_id: Uuid) -> Result<Vec<ParticipantRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT conversation_id, user_id, joined_at
            FROM conversation_participants
            WHERE conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| ParticipantRow {
                conversation_id: r.get("conversation_id"),
                user_id: r.get("user_id"),
                joined_at: r.get("joined_at"),
            })
            .collect())
    }

    async fn messages_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender_id, content, is_read, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::message_from_row).collect())
    }

    async fn latest_message(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<MessageRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, conversation_id, sender_id, content, is_read, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::message_from_row))
    }

    async fn unread_count(
        &self,
        conversation_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<u32, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count FROM messages
            WHERE conversation_id = $1 AND is_read = false AND sender_id <> $2
            "#,
        )
        .bind(conversation_id)
        .bind(viewer_id)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("count");
        Ok(count as u32)
    }

    async fn insert_message(&self, new: NewMessage) -> Result<MessageRow, StoreError> {
        let id = Uuid::new_v4();

        // created_at is assigned by the database clock so ordering within a
        // conversation does not depend on client clocks.
        let row = sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, content, is_read, created_at)
            VALUES ($1, $2, $3, $4, false, now())
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(new.conversation_id)
        .bind(new.sender_id)
        .bind(&new.content)
        .fetch_one(&self.pool)
        .await?;
        let created_at = row.get("created_at");

        sqlx::query(
            r#"
            UPDATE conversations SET updated_at = $1 WHERE id = $2
            "#,
        )
        .bind(created_at)
        .bind(new.conversation_id)
        .execute(&self.pool)
        .await?;

        let stored = MessageRow {
            id,
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            content: new.content,
            created_at,
            read: false,
        };
        broadcast_change(&self.changes, ChangeEvent::message_insert(&stored));
        Ok(stored)
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET is_read = true
            WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = false
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_message_read(&self, message_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET is_read = true WHERE id = $1
            "#,
        )
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("message {}", message_id)));
        }
        Ok(())
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<ProfileSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, display_name, handle, avatar_url FROM profiles WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ProfileSnapshot {
            user_id: r.get("user_id"),
            display_name: r.get("display_name"),
            handle: r.get("handle"),
            avatar_url: r.get("avatar_url"),
        }))
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), StoreError> {
        // FK-safe order: messages, then participants, then the conversation
        sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM conversation_participants WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        broadcast_change(&self.changes, ChangeEvent::conversation_delete(conversation_id));
        Ok(())
    }
}
