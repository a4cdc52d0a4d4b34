//! Cascade delete/restore protocol between a conversation and its messages.

mod common;

use chrono::{Duration, Utc};
use serial_test::serial;

use colloquy_common::Error;
use colloquy_conversations::{ConversationAttrs, Metadata};

use crate::common::TestApp;

async fn message_tombstones(app: &TestApp, conversation_id: i64) -> Vec<Option<chrono::DateTime<Utc>>> {
    sqlx::query_scalar(
        "SELECT deleted_at FROM messages WHERE conversation_id = $1 ORDER BY id",
    )
    .bind(conversation_id)
    .fetch_all(&app.pool)
    .await
    .unwrap()
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_soft_delete_cascades_to_live_messages() {
    let app = TestApp::new().await.unwrap();
    let conv = app
        .repos
        .conversations
        .create(None, ConversationAttrs::titled("doomed"))
        .await
        .unwrap();
    app.repos
        .messages
        .add_user_message(conv.id, "one", Metadata::new())
        .await
        .unwrap();
    app.repos
        .messages
        .add_assistant_message(conv.id, "two", Metadata::new())
        .await
        .unwrap();

    let deleted = app.repos.conversations.delete(conv.id).await.unwrap();
    assert!(deleted.is_trashed());

    // conversation and messages are invisible to live lookups
    assert!(app.repos.conversations.find(conv.id).await.unwrap().is_none());
    assert!(app
        .repos
        .messages
        .list_by_conversation(conv.id)
        .await
        .unwrap()
        .is_empty());

    // every message carries the conversation's tombstone timestamp
    let tombstones = message_tombstones(&app, conv.id).await;
    assert_eq!(tombstones.len(), 2);
    for tombstone in tombstones {
        assert_eq!(tombstone, deleted.deleted_at);
    }
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_restore_clears_cascaded_tombstones() {
    let app = TestApp::new().await.unwrap();
    let conv = app
        .repos
        .conversations
        .create(None, ConversationAttrs::default())
        .await
        .unwrap();
    app.repos
        .messages
        .add_user_message(conv.id, "kept", Metadata::new())
        .await
        .unwrap();

    app.repos.conversations.delete(conv.id).await.unwrap();
    let restored = app.repos.conversations.restore(conv.id).await.unwrap();
    assert!(!restored.is_trashed());

    let messages = app
        .repos
        .messages
        .list_by_conversation(conv.id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content.as_deref(), Some("kept"));
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_restore_skips_independently_deleted_messages() {
    let app = TestApp::new().await.unwrap();
    let conv = app
        .repos
        .conversations
        .create(None, ConversationAttrs::default())
        .await
        .unwrap();
    let kept = app
        .repos
        .messages
        .add_user_message(conv.id, "kept", Metadata::new())
        .await
        .unwrap();
    let removed = app
        .repos
        .messages
        .add_user_message(conv.id, "removed on purpose", Metadata::new())
        .await
        .unwrap();

    // the caller deletes one message deliberately, before the conversation
    app.repos.messages.delete(removed.id).await.unwrap();

    app.repos.conversations.delete(conv.id).await.unwrap();
    app.repos.conversations.restore(conv.id).await.unwrap();

    let messages = app
        .repos
        .messages
        .list_by_conversation(conv.id)
        .await
        .unwrap();
    let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![kept.id]);
    assert!(app.repos.messages.find(removed.id).await.unwrap().is_none());
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_force_delete_removes_rows_permanently() {
    let app = TestApp::new().await.unwrap();
    let conv = app
        .repos
        .conversations
        .create(None, ConversationAttrs::default())
        .await
        .unwrap();
    let message = app
        .repos
        .messages
        .start_streaming_assistant(conv.id, Metadata::new())
        .await
        .unwrap();
    app.repos
        .messages
        .append_chunk(message.id, "gone", Metadata::new())
        .await
        .unwrap();

    assert!(app.repos.conversations.force_delete(conv.id).await.unwrap());

    let remaining_messages: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
            .bind(conv.id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(remaining_messages, 0);

    let remaining_chunks: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM message_chunks WHERE message_id = $1")
            .bind(message.id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(remaining_chunks, 0);

    // force-deleting again reports nothing removed
    assert!(!app.repos.conversations.force_delete(conv.id).await.unwrap());
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_delete_missing_conversation_is_not_found() {
    let app = TestApp::new().await.unwrap();
    let err = app.repos.conversations.delete(i64::MAX).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_prune_removes_old_trashed_conversations() {
    let app = TestApp::new().await.unwrap();
    let conv = app
        .repos
        .conversations
        .create(None, ConversationAttrs::default())
        .await
        .unwrap();
    app.repos.conversations.delete(conv.id).await.unwrap();

    // cutoff in the past leaves the fresh tombstone alone
    let kept = app
        .repos
        .conversations
        .prune(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(kept, 0);

    // cutoff in the future removes it
    let pruned = app
        .repos
        .conversations
        .prune(Utc::now() + Duration::seconds(5))
        .await
        .unwrap();
    assert!(pruned >= 1);
}
