//! camino-chat
//!
//! Direct-messaging core for the Camino pilgrim platform: the one subsystem
//! of the app with genuine distributed-state concerns. Everything else the
//! platform does (routes, GPS tracks, social graph, feed, profiles) is
//! single-actor CRUD and lives elsewhere; this crate owns:
//!
//! - conversation resolution (one conversation per user pair, idempotent
//!   under concurrent creation)
//! - the conversation directory with last-message previews and unread counts
//! - ordered message streams with a live append feed
//! - read-state reconciliation between instant local zeroing and the
//!   eventually-consistent server count
//! - optimistic send with reconcile-or-rollback
//!
//! # Module Structure
//!
//! - **`shared`** - typed DTOs, change events, configuration, errors
//! - **`store`** - the `MessagingStore` seam plus Postgres and in-memory
//!   implementations
//! - **`realtime`** - the row-change broadcast and filtered subscriptions
//! - **`chat`** - the messaging components and the `ChatClient` facade
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use camino_chat::chat::ChatClient;
//! use camino_chat::shared::ChatConfig;
//! use camino_chat::store::memory::MemoryStore;
//!
//! # async fn example() -> Result<(), camino_chat::shared::ChatError> {
//! let store = Arc::new(MemoryStore::new());
//! let changes = store.changes();
//! let me = uuid::Uuid::new_v4();
//! let friend = uuid::Uuid::new_v4();
//!
//! let client = ChatClient::new(store, changes, me, ChatConfig::default());
//! let conversation = client.resolve_or_create(friend).await?;
//! let stream = client.open(conversation).await?;
//! stream.send("Buen Camino").await?;
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod realtime;
pub mod shared;
pub mod store;

pub use chat::{ChatClient, MessageStream};
pub use shared::{ChatConfig, ChatError, StoreError};
pub use store::MessagingStore;
