//! Shared setup for integration tests
//!
//! Builds a `ChatClient` over an in-memory store with two seeded pilgrim
//! profiles, plus helpers for acting as the peer.

use std::sync::Arc;

use uuid::Uuid;

use camino_chat::chat::ChatClient;
use camino_chat::shared::messaging::{MessageRow, NewMessage, ProfileSnapshot};
use camino_chat::shared::ChatConfig;
use camino_chat::store::memory::MemoryStore;
use camino_chat::store::MessagingStore;

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub client: ChatClient,
    /// The signed-in user
    pub ana: Uuid,
    /// The peer
    pub marta: Uuid,
}

/// A client for Ana with Marta seeded as the other pilgrim
pub fn env() -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let ana = Uuid::new_v4();
    let marta = Uuid::new_v4();
    store.insert_profile(ProfileSnapshot::new(ana, "Ana", "@ana"));
    store.insert_profile(ProfileSnapshot::new(marta, "Marta", "@marta"));

    let client = ChatClient::new(store.clone(), store.changes(), ana, ChatConfig::default());
    TestEnv {
        store,
        client,
        ana,
        marta,
    }
}

/// Insert a message from Marta directly through the store, as the server
/// would on her behalf
pub async fn marta_sends(env: &TestEnv, conversation_id: Uuid, content: &str) -> MessageRow {
    env.store
        .insert_message(NewMessage {
            conversation_id,
            sender_id: env.marta,
            content: content.to_string(),
        })
        .await
        .unwrap()
}
