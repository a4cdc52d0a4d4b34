//! Conversations domain: message lifecycle, streaming assembly, cascade soft delete
//!
//! A message is either created complete or opened in a streaming state and
//! assembled from ordered chunks before finalization. Conversations own
//! their messages and propagate soft-delete/restore to them atomically.

pub mod domain;
pub mod events;
pub mod owner;
pub mod repository;

// Re-export domain types at the crate root for convenience
pub use domain::chunks::ChunkSequencer;
pub use domain::entities::{
    Conversation, Message, MessageAttachment, MessageChunk, MessageRole, MessageStatus, Metadata,
};
pub use domain::ingest::{parse_batch, resolve_batch, MessageDraft, MessageInput};
pub use domain::messages::{
    AssistantMessage, SystemMessage, ToolCallMessage, ToolResultMessage, UserMessage,
};
pub use domain::state::{MessageEvent, MessageStateMachine, StateError};

// Re-export event types
pub use events::{
    ChunkPayload, ChunkReceived, ConversationCreated, ConverseEvent, EventSink, MessageCompleted,
    MessageCreated, NullEventSink,
};

// Re-export owner integration
pub use owner::{Conversable, OwnerRef};

// Re-export repository types
pub use repository::{
    ConversationAttrs, ConversationRepository, ConversationsRepositories, MessageRepository,
};
