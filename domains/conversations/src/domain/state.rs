//! State machine for message lifecycle transitions
//!
//! Message states: Pending (initial) -> Success | Error (terminal).
//! Completion events are accepted from any state so that re-entrant
//! finalization keeps its terminal guarantee; chunk appends are only
//! accepted while pending.

use crate::domain::entities::MessageStatus;
pub use colloquy_common::StateError;

/// Events that drive message state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEvent {
    /// Append a streaming chunk (requires Pending)
    AppendChunk,
    /// Finalize the stream successfully
    Complete,
    /// Finalize the stream with an error
    Fail,
}

impl std::fmt::Display for MessageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AppendChunk => write!(f, "append_chunk"),
            Self::Complete => write!(f, "complete"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Message lifecycle state machine
pub struct MessageStateMachine;

impl MessageStateMachine {
    /// Attempt a state transition
    pub fn transition(
        current: MessageStatus,
        event: MessageEvent,
    ) -> Result<MessageStatus, StateError> {
        match (current, event) {
            (MessageStatus::Pending, MessageEvent::AppendChunk) => Ok(MessageStatus::Pending),
            (_, MessageEvent::Complete) => Ok(MessageStatus::Success),
            (_, MessageEvent::Fail) => Ok(MessageStatus::Error),
            (from, MessageEvent::AppendChunk) => Err(StateError::InvalidTransition {
                from: from.to_string(),
                event: event.to_string(),
            }),
        }
    }

    /// Whether the message accepts chunk appends in its current state
    pub fn accepts_chunks(current: MessageStatus) -> bool {
        Self::transition(current, MessageEvent::AppendChunk).is_ok()
    }
}
