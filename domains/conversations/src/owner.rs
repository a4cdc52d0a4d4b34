//! Owner integration
//!
//! A conversation may belong to an owning entity of any kind. The relation
//! is an explicit `(kind, id)` pair resolved at the boundary; implementing
//! [`Conversable`] on an owner type gives it the conversation convenience
//! API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use colloquy_common::Result;

use crate::domain::entities::Conversation;
use crate::repository::{ConversationAttrs, ConversationRepository};

/// Explicit polymorphic owner reference: a kind tag plus an opaque id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub id: String,
}

impl OwnerRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Conversation API for owner entities.
///
/// Implementors supply their owner reference and a repository handle; the
/// conversation operations are provided.
#[async_trait]
pub trait Conversable {
    fn owner_ref(&self) -> OwnerRef;

    fn conversation_repository(&self) -> &ConversationRepository;

    /// Live conversations belonging to this owner, oldest first.
    async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.conversation_repository()
            .list_for_owner(&self.owner_ref())
            .await
    }

    /// Start a new conversation owned by this entity.
    async fn start_conversation(&self, attrs: ConversationAttrs) -> Result<Conversation> {
        self.conversation_repository()
            .create(Some(&self.owner_ref()), attrs)
            .await
    }

    /// Find one of this owner's live conversations by uuid.
    async fn find_conversation(&self, uuid: Uuid) -> Result<Option<Conversation>> {
        let found = self.conversation_repository().find_by_uuid(uuid).await?;
        Ok(found.filter(|conv| conv.owner() == Some(self.owner_ref())))
    }

    /// Fetch one of this owner's live conversations by id, failing with
    /// `NotFound` if absent or not owned by this entity.
    async fn continue_conversation(&self, id: i64) -> Result<Conversation> {
        let conv = self.conversation_repository().get(id).await?;
        if conv.owner() != Some(self.owner_ref()) {
            return Err(colloquy_common::Error::NotFound(format!(
                "conversation {id}"
            )));
        }
        Ok(conv)
    }
}
