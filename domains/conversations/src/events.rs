//! Lifecycle event payloads and the sink they are delivered to
//!
//! The core emits events after the corresponding storage write commits.
//! Delivery is fire-and-forget: the sink is an external broadcast
//! collaborator and no delivery guarantee is assumed here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{
    Conversation, Message, MessageChunk, MessageRole, MessageStatus, Metadata,
};

/// A conversation came into existence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationCreated {
    pub conversation_id: i64,
    pub uuid: Uuid,
    pub owner_kind: Option<String>,
    pub owner_id: Option<String>,
    pub title: Option<String>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

/// A message was created (complete or as a streaming start).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCreated {
    pub message_id: i64,
    pub conversation_id: i64,
    pub role: MessageRole,
    pub content: Option<String>,
    pub status: MessageStatus,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
}

/// One streaming fragment landed on a pending message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkReceived {
    pub message_id: i64,
    pub conversation_id: i64,
    pub chunk: ChunkPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub content: String,
    pub sequence: i32,
    pub metadata: Metadata,
}

/// A message reached a terminal state; shared by success and failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCompleted {
    pub message_id: i64,
    pub conversation_id: i64,
    pub role: MessageRole,
    pub content: Option<String>,
    pub status: MessageStatus,
    pub is_complete: bool,
    pub metadata: Metadata,
    pub completed_at: Option<DateTime<Utc>>,
}

/// All lifecycle notifications emitted by the conversations domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConverseEvent {
    ConversationCreated(ConversationCreated),
    MessageCreated(MessageCreated),
    ChunkReceived(ChunkReceived),
    MessageCompleted(MessageCompleted),
}

impl ConverseEvent {
    pub fn conversation_created(conversation: &Conversation) -> Self {
        Self::ConversationCreated(ConversationCreated {
            conversation_id: conversation.id,
            uuid: conversation.uuid,
            owner_kind: conversation.owner_kind.clone(),
            owner_id: conversation.owner_id.clone(),
            title: conversation.title.clone(),
            metadata: conversation.metadata.0.clone(),
            created_at: conversation.created_at,
        })
    }

    pub fn message_created(message: &Message) -> Self {
        Self::MessageCreated(MessageCreated {
            message_id: message.id,
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content.clone(),
            status: message.status,
            is_complete: message.is_complete,
            created_at: message.created_at,
        })
    }

    pub fn chunk_received(message: &Message, chunk: &MessageChunk) -> Self {
        Self::ChunkReceived(ChunkReceived {
            message_id: message.id,
            conversation_id: message.conversation_id,
            chunk: ChunkPayload {
                content: chunk.content.clone(),
                sequence: chunk.sequence,
                metadata: chunk.metadata.0.clone(),
            },
        })
    }

    pub fn message_completed(message: &Message) -> Self {
        Self::MessageCompleted(MessageCompleted {
            message_id: message.id,
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content.clone(),
            status: message.status,
            is_complete: message.is_complete,
            metadata: message.metadata.0.clone(),
            completed_at: message.completed_at,
        })
    }

    /// Broadcast routing tag for subscribers.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ConversationCreated(_) => "conversation.created",
            Self::MessageCreated(_) => "message.created",
            Self::ChunkReceived(_) => "chunk.received",
            Self::MessageCompleted(_) => "message.completed",
        }
    }

    /// Private channel the event belongs on. Conversation creation routes to
    /// the owner's channel when the conversation has one, falling back to the
    /// conversation's own channel; message-level events route to the owning
    /// conversation.
    pub fn channel(&self) -> String {
        match self {
            Self::ConversationCreated(ev) => match (&ev.owner_kind, &ev.owner_id) {
                (Some(kind), Some(id)) => format!("owner.{kind}.{id}"),
                _ => format!("conversation.{}", ev.conversation_id),
            },
            Self::MessageCreated(ev) => format!("conversation.{}", ev.conversation_id),
            Self::ChunkReceived(ev) => format!("conversation.{}", ev.conversation_id),
            Self::MessageCompleted(ev) => format!("conversation.{}", ev.conversation_id),
        }
    }
}

/// Receives lifecycle notifications for broadcast. Implementations must not
/// block the caller on subscriber acknowledgment.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: ConverseEvent);
}

/// Sink that drops every event; the default when no transport is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn publish(&self, event: ConverseEvent) {
        tracing::trace!(event = event.event_name(), "event dropped (null sink)");
    }
}
