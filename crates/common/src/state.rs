//! State-machine error support shared by domain state machines

use serde::{Deserialize, Serialize};

/// Error returned when a state machine rejects a transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum StateError {
    #[error("invalid transition from '{from}' on event '{event}'")]
    InvalidTransition { from: String, event: String },
}

impl From<StateError> for crate::error::Error {
    fn from(err: StateError) -> Self {
        crate::error::Error::InvalidState(err.to_string())
    }
}
