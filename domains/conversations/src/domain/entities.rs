//! Domain entities for the Conversations domain
//!
//! Conversations own an ordered collection of messages (creation order);
//! messages own ordered chunks (streaming fragments) and attachments. All
//! entities map directly onto the persisted schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use crate::owner::OwnerRef;

/// Open key-value map used for `metadata` and `context` columns.
pub type Metadata = serde_json::Map<String, Value>;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    ToolCall,
    ToolResult,
}

impl MessageRole {
    /// The wire tag for this role (`user`, `assistant`, `system`,
    /// `tool_call`, `tool_result`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::ToolCall => "tool_call",
            MessageRole::ToolResult => "tool_result",
        }
    }

    /// Parse a wire tag into a role. Returns `None` for unrecognized tags;
    /// callers decide how to report the offending tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            "tool_call" => Some(MessageRole::ToolCall),
            "tool_result" => Some(MessageRole::ToolResult),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "message_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    #[default]
    Success,
    Error,
}

impl MessageStatus {
    /// Pending is the only non-terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MessageStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Success => "success",
            MessageStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Conversation entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: i64,
    pub uuid: Uuid,
    pub owner_kind: Option<String>,
    pub owner_id: Option<String>,
    pub title: Option<String>,
    pub metadata: Json<Metadata>,
    pub context: Json<Metadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Build a conversation ready for insertion. `id` is assigned by storage.
    pub fn new(
        owner: Option<&OwnerRef>,
        title: Option<String>,
        metadata: Metadata,
        context: Metadata,
    ) -> Self {
        let now = Utc::now();
        Conversation {
            id: 0,
            uuid: Uuid::new_v4(),
            owner_kind: owner.map(|o| o.kind.clone()),
            owner_id: owner.map(|o| o.id.clone()),
            title,
            metadata: Json(metadata),
            context: Json(context),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// A conversation is trashed when it carries a tombstone.
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn owner(&self) -> Option<OwnerRef> {
        match (&self.owner_kind, &self.owner_id) {
            (Some(kind), Some(id)) => Some(OwnerRef::new(kind, id)),
            _ => None,
        }
    }
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub uuid: Uuid,
    pub conversation_id: i64,
    pub role: MessageRole,
    pub content: Option<String>,
    pub metadata: Json<Metadata>,
    pub status: MessageStatus,
    pub is_complete: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Build a non-streaming message ready for insertion.
    ///
    /// Non-empty content yields a completed message (`Success`,
    /// `is_complete`, `completed_at` set). Empty or absent content records
    /// `Success` but leaves the message incomplete with no completion time.
    pub fn completed(
        conversation_id: i64,
        role: MessageRole,
        content: Option<String>,
        metadata: Metadata,
    ) -> Self {
        let now = Utc::now();
        let filled = content.as_deref().is_some_and(|c| !c.is_empty());
        Message {
            id: 0,
            uuid: Uuid::new_v4(),
            conversation_id,
            role,
            content,
            metadata: Json(metadata),
            status: MessageStatus::Success,
            is_complete: filled,
            completed_at: filled.then_some(now),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Open a streaming message: `Pending`, empty content, incomplete.
    /// Metadata is tagged with `"streamed": true`.
    pub fn streaming(conversation_id: i64, role: MessageRole, mut metadata: Metadata) -> Self {
        metadata.insert("streamed".to_string(), Value::Bool(true));
        let now = Utc::now();
        Message {
            id: 0,
            uuid: Uuid::new_v4(),
            conversation_id,
            role,
            content: Some(String::new()),
            metadata: Json(metadata),
            status: MessageStatus::Pending,
            is_complete: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// A message accepts chunks only while pending.
    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Pending
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Append a chunk fragment to the assembled content.
    pub fn apply_chunk(&mut self, fragment: &str) {
        match &mut self.content {
            Some(content) => content.push_str(fragment),
            None => self.content = Some(fragment.to_string()),
        }
        self.updated_at = Utc::now();
    }

    /// Terminal success transition: merge final metadata, record the chunk
    /// count, and stamp the completion time. Re-entry overwrites the stamp
    /// and metadata; the terminal guarantee itself is idempotent.
    pub fn finish_streaming(&mut self, final_metadata: Metadata, chunk_count: i64) {
        self.merge_metadata(final_metadata);
        self.metadata
            .insert("chunks".to_string(), Value::from(chunk_count));
        self.status = MessageStatus::Success;
        self.is_complete = true;
        let now = Utc::now();
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Terminal error transition for a streaming message; metadata gains an
    /// `"error"` field alongside the chunk count.
    pub fn fail_streaming(&mut self, error: &str, error_metadata: Metadata, chunk_count: i64) {
        self.merge_metadata(error_metadata);
        self.metadata
            .insert("error".to_string(), Value::from(error));
        self.metadata
            .insert("chunks".to_string(), Value::from(chunk_count));
        self.status = MessageStatus::Error;
        self.is_complete = true;
        let now = Utc::now();
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Direct transition to `Error` for non-streaming failures; no
    /// chunk-count bookkeeping.
    pub fn mark_error(&mut self, error: &str, error_metadata: Metadata) {
        self.merge_metadata(error_metadata);
        self.metadata
            .insert("error".to_string(), Value::from(error));
        self.status = MessageStatus::Error;
        self.is_complete = true;
        let now = Utc::now();
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    fn merge_metadata(&mut self, incoming: Metadata) {
        for (key, value) in incoming {
            self.metadata.insert(key, value);
        }
    }

    pub fn is_tool_call(&self) -> bool {
        self.role == MessageRole::ToolCall
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == MessageRole::ToolResult
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata.get("tool_call_id").and_then(Value::as_str)
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.metadata.get("tool_name").and_then(Value::as_str)
    }
}

/// An ordered content fragment appended during streaming assembly.
/// Immutable once written (no updated_at).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageChunk {
    pub id: i64,
    pub message_id: i64,
    pub content: String,
    pub sequence: i32,
    pub metadata: Json<Metadata>,
    pub created_at: DateTime<Utc>,
}

impl MessageChunk {
    pub fn new(message_id: i64, content: String, sequence: i32, metadata: Metadata) -> Self {
        MessageChunk {
            id: 0,
            message_id,
            content,
            sequence,
            metadata: Json(metadata),
            created_at: Utc::now(),
        }
    }
}

/// Binary attachment reference; blob storage lives outside this domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageAttachment {
    pub id: i64,
    pub message_id: i64,
    pub kind: String,
    pub path: String,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub metadata: Json<Metadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
