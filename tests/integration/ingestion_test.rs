//! Heterogeneous batch ingestion against live storage.

mod common;

use serde_json::json;
use serial_test::serial;

use colloquy_common::Error;
use colloquy_conversations::{
    parse_batch, AssistantMessage, ConversationAttrs, MessageInput, MessageRole, Metadata,
    ToolCallMessage,
};

use crate::common::TestApp;

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_mixed_shapes_ingest_in_order() {
    let app = TestApp::new().await.unwrap();
    let conv = app
        .repos
        .conversations
        .create(None, ConversationAttrs::default())
        .await
        .unwrap();

    let values = vec![
        json!("hi"),
        json!({"role": "assistant", "content": "hey"}),
        json!({"type": "system", "content": "be nice"}),
    ];
    let inputs = parse_batch(&values).unwrap();
    let created = app.repos.messages.add_messages(conv.id, inputs).await.unwrap();

    let roles: Vec<MessageRole> = created.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::User, MessageRole::Assistant, MessageRole::System]
    );
    assert_eq!(created[0].content.as_deref(), Some("hi"));
    assert_eq!(created[1].content.as_deref(), Some("hey"));
    assert_eq!(created[2].content.as_deref(), Some("be nice"));

    // persisted order matches input order
    let listed = app
        .repos
        .messages
        .list_by_conversation(conv.id)
        .await
        .unwrap();
    let listed_ids: Vec<i64> = listed.iter().map(|m| m.id).collect();
    let created_ids: Vec<i64> = created.iter().map(|m| m.id).collect();
    assert_eq!(listed_ids, created_ids);
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_structured_wrappers_ingest() {
    let app = TestApp::new().await.unwrap();
    let conv = app
        .repos
        .conversations
        .create(None, ConversationAttrs::default())
        .await
        .unwrap();

    let mut metadata = Metadata::new();
    metadata.insert("tool_call_id".to_string(), json!("call_9"));
    metadata.insert("tool_name".to_string(), json!("search"));

    let created = app
        .repos
        .messages
        .add_messages(
            conv.id,
            vec![
                AssistantMessage::new("let me check").into(),
                ToolCallMessage::with_metadata("{\"q\":\"weather\"}", metadata).into(),
            ],
        )
        .await
        .unwrap();

    assert_eq!(created[0].role, MessageRole::Assistant);
    assert_eq!(created[1].role, MessageRole::ToolCall);
    assert!(created[1].is_tool_call());
    assert_eq!(created[1].tool_call_id(), Some("call_9"));
    assert_eq!(created[1].tool_name(), Some("search"));
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_bad_entry_fails_batch_with_nothing_created() {
    let app = TestApp::new().await.unwrap();
    let conv = app
        .repos
        .conversations
        .create(None, ConversationAttrs::default())
        .await
        .unwrap();

    let inputs = vec![
        MessageInput::from("first"),
        MessageInput::Typed {
            kind: "bogus".to_string(),
            content: "x".to_string(),
            metadata: Metadata::new(),
        },
    ];
    let err = app
        .repos
        .messages
        .add_messages(conv.id, inputs)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(err.to_string().contains("bogus"));

    // all-or-nothing: the valid leading entry was not created either
    assert!(app
        .repos
        .messages
        .list_by_conversation(conv.id)
        .await
        .unwrap()
        .is_empty());
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_recent_messages_clamps_negative_count() {
    let app = TestApp::new().await.unwrap();
    let conv = app
        .repos
        .conversations
        .create(None, ConversationAttrs::default())
        .await
        .unwrap();
    let inputs = parse_batch(&[json!("one"), json!("two")]).unwrap();
    app.repos.messages.add_messages(conv.id, inputs).await.unwrap();

    let none = app
        .repos
        .messages
        .recent_messages(conv.id, -3)
        .await
        .unwrap();
    assert!(none.is_empty());

    let last = app
        .repos
        .messages
        .recent_messages(conv.id, 1)
        .await
        .unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].content.as_deref(), Some("two"));
}

#[test_log::test(tokio::test)]
#[serial]
#[ignore] // Requires DATABASE_URL pointing at a PostgreSQL instance
async fn test_ingest_into_missing_conversation_is_not_found() {
    let app = TestApp::new().await.unwrap();
    let err = app
        .repos
        .messages
        .add_messages(i64::MAX, vec![MessageInput::from("hello")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
