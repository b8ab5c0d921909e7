//! End-to-end messaging flows over the in-memory store: conversation
//! resolution, optimistic send, the live feed, and deletion.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use uuid::Uuid;

use camino_chat::chat::ChatClient;
use camino_chat::shared::messaging::DeliveryState;
use camino_chat::shared::{ChatConfig, ChatError};
use camino_chat::store::MessagingStore;

use common::{env, marta_sends};

#[tokio::test]
async fn test_resolution_is_idempotent_across_both_directions() {
    let e = env();
    let from_ana = e.client.resolve_or_create(e.marta).await.unwrap();
    let again = e.client.resolve_or_create(e.marta).await.unwrap();
    assert_eq!(from_ana, again);

    // Marta resolving toward Ana lands on the same conversation
    let marta_client = ChatClient::new(
        e.store.clone(),
        e.store.changes(),
        e.marta,
        ChatConfig::default(),
    );
    let from_marta = marta_client.resolve_or_create(e.ana).await.unwrap();
    assert_eq!(from_ana, from_marta);
}

#[tokio::test]
async fn test_resolution_fallback_without_the_pair_primitive() {
    let e = env();
    e.store.disable_pair_primitive();

    let first = e.client.resolve_or_create(e.marta).await.unwrap();
    let second = e.client.resolve_or_create(e.marta).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_optimistic_send_lands_in_store_and_directory() {
    let e = env();
    let conv = e.client.resolve_or_create(e.marta).await.unwrap();
    let stream = e.client.open(conv).await.unwrap();

    let row = stream.send("Buen Camino").await.unwrap();

    let messages = stream.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].delivery, DeliveryState::Confirmed);
    // the provisional temp id has been replaced by the server id
    assert_eq!(messages[0].local_id, row.id);

    let stored = e.store.messages_for_conversation(conv).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "Buen Camino");

    let list = e.client.conversations().await.unwrap();
    assert_eq!(list[0].last_message_preview, "Buen Camino");
    assert_eq!(list[0].unread_count, 0);
}

#[tokio::test]
async fn test_failed_send_rolls_back_and_restores_draft() {
    let e = env();
    let conv = e.client.resolve_or_create(e.marta).await.unwrap();
    let stream = e.client.open(conv).await.unwrap();

    e.client.session().set_draft("¿Albergue esta noche?");
    e.store.fail_next_message_insert();
    let result = stream.send("¿Albergue esta noche?").await;

    assert_matches!(result, Err(ChatError::Store(_)));
    assert!(stream.messages().is_empty());
    assert_eq!(e.client.session().draft(), "¿Albergue esta noche?");
    assert!(e
        .store
        .messages_for_conversation(conv)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_peer_message_arrives_over_the_live_feed() {
    let e = env();
    let conv = e.client.resolve_or_create(e.marta).await.unwrap();
    let stream = e.client.open(conv).await.unwrap();

    marta_sends(&e, conv, "¡Ya llegué a Sarria!").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let messages = stream.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].row.content, "¡Ya llegué a Sarria!");
    assert_eq!(
        messages[0].sender.as_ref().map(|p| p.handle.as_str()),
        Some("@marta")
    );
}

#[tokio::test]
async fn test_open_is_refused_for_non_participants() {
    let e = env();
    let conv = e.client.resolve_or_create(e.marta).await.unwrap();

    let outsider = ChatClient::new(
        e.store.clone(),
        e.store.changes(),
        Uuid::new_v4(),
        ChatConfig::default(),
    );
    assert_matches!(
        outsider.open(conv).await,
        Err(ChatError::NotAParticipant { .. })
    );
}

#[tokio::test]
async fn test_delete_removes_conversation_and_resolution_starts_fresh() {
    let e = env();
    let conv = e.client.resolve_or_create(e.marta).await.unwrap();
    let stream = e.client.open(conv).await.unwrap();
    stream.send("hasta luego").await.unwrap();
    drop(stream);

    e.client.delete(conv).await.unwrap();

    assert!(e.store.conversation(conv).await.unwrap().is_none());
    assert!(e
        .store
        .messages_for_conversation(conv)
        .await
        .unwrap()
        .is_empty());
    assert!(e.client.conversations().await.unwrap().is_empty());
    assert_eq!(e.client.session().open_conversation(), None);

    // a fresh resolution creates a distinct conversation
    let fresh = e.client.resolve_or_create(e.marta).await.unwrap();
    assert_ne!(fresh, conv);
}
