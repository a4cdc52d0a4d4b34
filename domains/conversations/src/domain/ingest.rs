//! Heterogeneous message ingestion
//!
//! Batch input arrives in one of four shapes, each a variant of the closed
//! [`MessageInput`] type: plain text (defaults to the user role), a record
//! carrying an explicit role, a record carrying a role tag under `type`, or
//! a structured draft produced by one of the role-specific message types.
//! Untyped JSON batches go through [`MessageInput::from_value`], where shape
//! errors surface as `InvalidInput`.

use serde_json::Value;

use colloquy_common::{Error, Result};

use crate::domain::entities::{MessageRole, Metadata};

/// A fully-resolved message specification, ready for creation.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub role: MessageRole,
    pub content: String,
    pub metadata: Metadata,
}

impl MessageDraft {
    pub fn new(role: MessageRole, content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            role,
            content: content.into(),
            metadata,
        }
    }
}

/// One entry of a heterogeneous ingestion batch.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageInput {
    /// Plain text; ingested as a user message.
    Text(String),
    /// Record with an explicit role.
    Record {
        role: MessageRole,
        content: String,
        metadata: Metadata,
    },
    /// Record with a role tag under `type`; the tag is validated at
    /// resolution time.
    Typed {
        kind: String,
        content: String,
        metadata: Metadata,
    },
    /// Structured draft from a role-specific message type.
    Structured(MessageDraft),
}

impl MessageInput {
    /// Parse an untyped JSON value into an input variant.
    ///
    /// Recognized shapes: a string, an object with `role` and `content`, an
    /// object with `type` and `content`. Anything else fails with
    /// `InvalidInput` naming the value's JSON type.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(MessageInput::Text(text.clone())),
            Value::Object(map) => {
                let content = |key: &str| -> Result<String> {
                    map.get(key)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            Error::InvalidInput(format!("message '{key}' must be a string"))
                        })
                };

                if map.contains_key("role") && map.contains_key("content") {
                    let tag = map.get("role").and_then(Value::as_str).ok_or_else(|| {
                        Error::InvalidInput("message 'role' must be a string".to_string())
                    })?;
                    let role = MessageRole::from_tag(tag).ok_or_else(|| {
                        Error::InvalidInput(format!("Unknown message role: {tag}"))
                    })?;
                    Ok(MessageInput::Record {
                        role,
                        content: content("content")?,
                        metadata: parse_metadata(map.get("metadata"))?,
                    })
                } else if map.contains_key("type") && map.contains_key("content") {
                    let kind = map.get("type").and_then(Value::as_str).ok_or_else(|| {
                        Error::InvalidInput("message 'type' must be a string".to_string())
                    })?;
                    Ok(MessageInput::Typed {
                        kind: kind.to_string(),
                        content: content("content")?,
                        metadata: parse_metadata(map.get("metadata"))?,
                    })
                } else {
                    Err(Error::InvalidInput(
                        "Unknown message shape: object without role/content or type/content"
                            .to_string(),
                    ))
                }
            }
            other => Err(Error::InvalidInput(format!(
                "Unknown message shape: {}",
                json_type_name(other)
            ))),
        }
    }

    /// Resolve the input into a draft. The only failure left at this point
    /// is an unrecognized `type` tag.
    pub fn resolve(self) -> Result<MessageDraft> {
        match self {
            MessageInput::Text(content) => {
                Ok(MessageDraft::new(MessageRole::User, content, Metadata::new()))
            }
            MessageInput::Record {
                role,
                content,
                metadata,
            } => Ok(MessageDraft::new(role, content, metadata)),
            MessageInput::Typed {
                kind,
                content,
                metadata,
            } => {
                let role = MessageRole::from_tag(&kind)
                    .ok_or_else(|| Error::InvalidInput(format!("Unknown message type: {kind}")))?;
                Ok(MessageDraft::new(role, content, metadata))
            }
            MessageInput::Structured(draft) => Ok(draft),
        }
    }
}

impl From<&str> for MessageInput {
    fn from(text: &str) -> Self {
        MessageInput::Text(text.to_string())
    }
}

impl From<String> for MessageInput {
    fn from(text: String) -> Self {
        MessageInput::Text(text)
    }
}

impl From<MessageDraft> for MessageInput {
    fn from(draft: MessageDraft) -> Self {
        MessageInput::Structured(draft)
    }
}

/// Resolve a whole batch, fail-fast, preserving input order. Nothing is
/// created until every entry resolves; the caller persists the drafts as a
/// single unit.
pub fn resolve_batch(inputs: Vec<MessageInput>) -> Result<Vec<MessageDraft>> {
    inputs.into_iter().map(MessageInput::resolve).collect()
}

/// Parse a batch of untyped JSON values, fail-fast, preserving order.
pub fn parse_batch(values: &[Value]) -> Result<Vec<MessageInput>> {
    values.iter().map(MessageInput::from_value).collect()
}

fn parse_metadata(value: Option<&Value>) -> Result<Metadata> {
    match value {
        None | Some(Value::Null) => Ok(Metadata::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(Error::InvalidInput(format!(
            "message 'metadata' must be an object, got {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
