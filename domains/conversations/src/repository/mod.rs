//! Repository layer over PostgreSQL

pub mod conversations;
pub mod messages;

pub use conversations::{ConversationAttrs, ConversationRepository};
pub use messages::MessageRepository;

use std::sync::Arc;

use sqlx::PgPool;

use colloquy_common::TableConfig;

use crate::events::EventSink;

/// Bundle of all repositories for the conversations domain, sharing one
/// pool, table configuration, and event sink.
#[derive(Clone)]
pub struct ConversationsRepositories {
    pub conversations: ConversationRepository,
    pub messages: MessageRepository,
}

impl ConversationsRepositories {
    pub fn new(pool: PgPool, tables: TableConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            conversations: ConversationRepository::new(
                pool.clone(),
                tables.clone(),
                events.clone(),
            ),
            messages: MessageRepository::new(pool, tables, events),
        }
    }
}
