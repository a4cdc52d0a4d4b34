//! Role-specific message types
//!
//! Typed wrappers for the five roles, each convertible into a structured
//! [`MessageDraft`] for batch ingestion or single creation.

use crate::domain::entities::{MessageRole, Metadata};
use crate::domain::ingest::{MessageDraft, MessageInput};

macro_rules! role_message {
    ($(#[$doc:meta])* $name:ident => $role:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            pub content: String,
            pub metadata: Metadata,
        }

        impl $name {
            pub const ROLE: MessageRole = $role;

            pub fn new(content: impl Into<String>) -> Self {
                Self {
                    content: content.into(),
                    metadata: Metadata::new(),
                }
            }

            pub fn with_metadata(content: impl Into<String>, metadata: Metadata) -> Self {
                Self {
                    content: content.into(),
                    metadata,
                }
            }

            pub fn to_draft(&self) -> MessageDraft {
                MessageDraft::new(Self::ROLE, self.content.clone(), self.metadata.clone())
            }
        }

        impl From<$name> for MessageDraft {
            fn from(message: $name) -> Self {
                MessageDraft::new($name::ROLE, message.content, message.metadata)
            }
        }

        impl From<$name> for MessageInput {
            fn from(message: $name) -> Self {
                MessageInput::Structured(message.into())
            }
        }
    };
}

role_message! {
    /// A message authored by the end user.
    UserMessage => MessageRole::User
}

role_message! {
    /// A model-generated reply.
    AssistantMessage => MessageRole::Assistant
}

role_message! {
    /// A system instruction.
    SystemMessage => MessageRole::System
}

role_message! {
    /// A model-initiated tool invocation; metadata typically carries
    /// `tool_call_id` and `tool_name`.
    ToolCallMessage => MessageRole::ToolCall
}

role_message! {
    /// The result returned by a tool invocation.
    ToolResultMessage => MessageRole::ToolResult
}
