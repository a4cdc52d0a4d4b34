//! Message repository: lifecycle persistence, streaming chunk assembly,
//! batch ingestion, and message-level queries.
//!
//! Chunk appends are serialized per message by taking a row lock on the
//! parent message for the duration of the transaction; the persisted
//! UNIQUE(message_id, sequence) index is the backstop, surfacing any
//! collision as a constraint violation instead of a silent duplicate.

use std::sync::Arc;

use sqlx::PgPool;

use colloquy_common::{map_constraint_violation, Error, Result, TableConfig};

use crate::domain::chunks::ChunkSequencer;
use crate::domain::entities::{
    Message, MessageAttachment, MessageChunk, MessageRole, Metadata,
};
use crate::domain::ingest::{resolve_batch, MessageDraft, MessageInput};
use crate::domain::state::{MessageEvent, MessageStateMachine};
use crate::events::{ConverseEvent, EventSink};

pub(crate) const MESSAGE_COLUMNS: &str = "id, uuid, conversation_id, role, content, metadata, \
     status, is_complete, completed_at, created_at, updated_at, deleted_at";

const CHUNK_COLUMNS: &str = "id, message_id, content, sequence, metadata, created_at";

const ATTACHMENT_COLUMNS: &str =
    "id, message_id, kind, path, mime_type, size, metadata, created_at, updated_at";

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
    tables: TableConfig,
    events: Arc<dyn EventSink>,
}

impl MessageRepository {
    pub fn new(pool: PgPool, tables: TableConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            pool,
            tables,
            events,
        }
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a non-streaming message. Non-empty content lands complete
    /// (`Success`, `completed_at` set); empty content is recorded but left
    /// incomplete.
    pub async fn create(
        &self,
        conversation_id: i64,
        role: MessageRole,
        content: Option<String>,
        metadata: Metadata,
    ) -> Result<Message> {
        self.ensure_conversation(conversation_id).await?;
        let draft = Message::completed(conversation_id, role, content, metadata);
        let created = self.insert(&draft, &self.pool).await?;

        tracing::info!(
            message_id = created.id,
            conversation_id,
            role = %created.role,
            "message created"
        );
        self.events
            .publish(ConverseEvent::message_created(&created))
            .await;
        Ok(created)
    }

    pub async fn add_user_message(
        &self,
        conversation_id: i64,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Message> {
        self.create(conversation_id, MessageRole::User, Some(content.into()), metadata)
            .await
    }

    pub async fn add_assistant_message(
        &self,
        conversation_id: i64,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Message> {
        self.create(
            conversation_id,
            MessageRole::Assistant,
            Some(content.into()),
            metadata,
        )
        .await
    }

    pub async fn add_system_message(
        &self,
        conversation_id: i64,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Message> {
        self.create(conversation_id, MessageRole::System, Some(content.into()), metadata)
            .await
    }

    pub async fn add_tool_call_message(
        &self,
        conversation_id: i64,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Message> {
        self.create(
            conversation_id,
            MessageRole::ToolCall,
            Some(content.into()),
            metadata,
        )
        .await
    }

    pub async fn add_tool_result_message(
        &self,
        conversation_id: i64,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Message> {
        self.create(
            conversation_id,
            MessageRole::ToolResult,
            Some(content.into()),
            metadata,
        )
        .await
    }

    /// Open a streaming message in the `Pending` state.
    pub async fn start_streaming(
        &self,
        conversation_id: i64,
        role: MessageRole,
        metadata: Metadata,
    ) -> Result<Message> {
        self.ensure_conversation(conversation_id).await?;
        let draft = Message::streaming(conversation_id, role, metadata);
        let created = self.insert(&draft, &self.pool).await?;

        tracing::info!(
            message_id = created.id,
            conversation_id,
            role = %created.role,
            "streaming message opened"
        );
        self.events
            .publish(ConverseEvent::message_created(&created))
            .await;
        Ok(created)
    }

    pub async fn start_streaming_assistant(
        &self,
        conversation_id: i64,
        metadata: Metadata,
    ) -> Result<Message> {
        self.start_streaming(conversation_id, MessageRole::Assistant, metadata)
            .await
    }

    pub async fn start_streaming_user(
        &self,
        conversation_id: i64,
        metadata: Metadata,
    ) -> Result<Message> {
        self.start_streaming(conversation_id, MessageRole::User, metadata)
            .await
    }

    /// Ingest a heterogeneous batch, all-or-nothing.
    ///
    /// Every entry is resolved before storage is touched, so a bad entry
    /// fails the batch with nothing created; the inserts then share one
    /// transaction. Creation events are emitted after commit, in input
    /// order.
    pub async fn add_messages(
        &self,
        conversation_id: i64,
        inputs: Vec<MessageInput>,
    ) -> Result<Vec<Message>> {
        let drafts = resolve_batch(inputs)?;
        self.ensure_conversation(conversation_id).await?;

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(drafts.len());
        for MessageDraft {
            role,
            content,
            metadata,
        } in drafts
        {
            let draft = Message::completed(conversation_id, role, Some(content), metadata);
            created.push(self.insert(&draft, &mut *tx).await?);
        }
        tx.commit().await?;

        tracing::info!(
            conversation_id,
            count = created.len(),
            "message batch ingested"
        );
        for message in &created {
            self.events
                .publish(ConverseEvent::message_created(message))
                .await;
        }
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Streaming assembly
    // ------------------------------------------------------------------

    /// Append a chunk to a pending message.
    ///
    /// The parent message row is locked for the transaction, so appends are
    /// serialized per message and sequences stay gapless. Appending to a
    /// terminal message fails with `InvalidState`. An empty fragment still
    /// consumes a sequence number.
    pub async fn append_chunk(
        &self,
        message_id: i64,
        content: &str,
        metadata: Metadata,
    ) -> Result<MessageChunk> {
        let mut tx = self.pool.begin().await?;

        let mut message = self.lock_message(&mut tx, message_id).await?;
        MessageStateMachine::transition(message.status, MessageEvent::AppendChunk)?;

        let sql = format!(
            "SELECT sequence FROM {table} WHERE message_id = $1",
            table = self.tables.message_chunks,
        );
        let sequences: Vec<i32> = sqlx::query_scalar(&sql)
            .bind(message_id)
            .fetch_all(&mut *tx)
            .await?;
        let sequence = ChunkSequencer::next_sequence(&sequences);

        let sql = format!(
            "INSERT INTO {table} (message_id, content, sequence, metadata, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             RETURNING {CHUNK_COLUMNS}",
            table = self.tables.message_chunks,
        );
        let chunk = sqlx::query_as::<_, MessageChunk>(&sql)
            .bind(message_id)
            .bind(content)
            .bind(sequence)
            .bind(sqlx::types::Json(metadata))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_constraint_violation(e, "duplicate chunk sequence"))?;

        message.apply_chunk(content);
        let sql = format!(
            "UPDATE {table} SET content = $2, updated_at = $3 WHERE id = $1",
            table = self.tables.messages,
        );
        sqlx::query(&sql)
            .bind(message_id)
            .bind(&message.content)
            .bind(message.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(message_id, sequence, "chunk appended");
        self.events
            .publish(ConverseEvent::chunk_received(&message, &chunk))
            .await;
        Ok(chunk)
    }

    /// Finalize a streaming message successfully: merge final metadata,
    /// record the chunk count, and stamp the completion time.
    pub async fn complete_streaming(
        &self,
        message_id: i64,
        final_metadata: Metadata,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        let mut message = self.lock_message(&mut tx, message_id).await?;
        let chunk_count = self.chunk_count(&mut tx, message_id).await?;
        message.finish_streaming(final_metadata, chunk_count);

        let completed = self.persist_terminal(&mut tx, &message).await?;
        tx.commit().await?;

        tracing::info!(message_id, chunks = chunk_count, "streaming completed");
        self.events
            .publish(ConverseEvent::message_completed(&completed))
            .await;
        Ok(completed)
    }

    /// Finalize a streaming message with an error; partial content is kept
    /// and metadata gains the error description.
    pub async fn fail_streaming(
        &self,
        message_id: i64,
        error: &str,
        error_metadata: Metadata,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        let mut message = self.lock_message(&mut tx, message_id).await?;
        let chunk_count = self.chunk_count(&mut tx, message_id).await?;
        message.fail_streaming(error, error_metadata, chunk_count);

        let failed = self.persist_terminal(&mut tx, &message).await?;
        tx.commit().await?;

        tracing::info!(message_id, error, "streaming failed");
        self.events
            .publish(ConverseEvent::message_completed(&failed))
            .await;
        Ok(failed)
    }

    /// Direct transition to `Error` for non-streaming failures; no chunk
    /// bookkeeping and no completion event.
    pub async fn mark_error(
        &self,
        message_id: i64,
        error: &str,
        error_metadata: Metadata,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        let mut message = self.lock_message(&mut tx, message_id).await?;
        message.mark_error(error, error_metadata);

        let updated = self.persist_terminal(&mut tx, &message).await?;
        tx.commit().await?;

        tracing::info!(message_id, error, "message marked as error");
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Find a live message by id.
    pub async fn find(&self, message_id: i64) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM {table} WHERE id = $1 AND deleted_at IS NULL",
            table = self.tables.messages,
        );
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    /// Fetch a live message by id, failing with `NotFound` if absent.
    pub async fn get(&self, message_id: i64) -> Result<Message> {
        self.find(message_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("message {message_id}")))
    }

    /// List live messages of a conversation in creation order.
    pub async fn list_by_conversation(&self, conversation_id: i64) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM {table} \
             WHERE conversation_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at, id",
            table = self.tables.messages,
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }

    /// The most recently created live message of a conversation.
    pub async fn last_message(&self, conversation_id: i64) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM {table} \
             WHERE conversation_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            table = self.tables.messages,
        );
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    /// The `count` most recent live messages, returned in creation order.
    /// A non-positive `count` yields an empty list.
    pub async fn recent_messages(&self, conversation_id: i64, count: i64) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM {table} \
             WHERE conversation_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC LIMIT $2",
            table = self.tables.messages,
        );
        let mut messages = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .bind(count.max(0))
            .fetch_all(&self.pool)
            .await?;
        messages.reverse();
        Ok(messages)
    }

    /// Live messages of a conversation with the given role.
    pub async fn list_by_role(
        &self,
        conversation_id: i64,
        role: MessageRole,
    ) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM {table} \
             WHERE conversation_id = $1 AND role = $2 AND deleted_at IS NULL \
             ORDER BY created_at, id",
            table = self.tables.messages,
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .bind(role)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }

    /// Live completed messages of a conversation.
    pub async fn list_completed(&self, conversation_id: i64) -> Result<Vec<Message>> {
        self.list_by_completion(conversation_id, true).await
    }

    /// Live messages still streaming (incomplete).
    pub async fn list_streaming(&self, conversation_id: i64) -> Result<Vec<Message>> {
        self.list_by_completion(conversation_id, false).await
    }

    /// Live messages that terminated in error.
    pub async fn list_failed(&self, conversation_id: i64) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM {table} \
             WHERE conversation_id = $1 AND status = 'error' AND deleted_at IS NULL \
             ORDER BY created_at, id",
            table = self.tables.messages,
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }

    /// Chunks of a message in ascending sequence order.
    pub async fn chunks(&self, message_id: i64) -> Result<Vec<MessageChunk>> {
        let sql = format!(
            "SELECT {CHUNK_COLUMNS} FROM {table} WHERE message_id = $1 ORDER BY sequence",
            table = self.tables.message_chunks,
        );
        let chunks = sqlx::query_as::<_, MessageChunk>(&sql)
            .bind(message_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(chunks)
    }

    /// Soft-delete a single message without touching the conversation.
    pub async fn delete(&self, message_id: i64) -> Result<Message> {
        let sql = format!(
            "UPDATE {table} SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {MESSAGE_COLUMNS}",
            table = self.tables.messages,
        );
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("message {message_id}")))?;

        tracing::info!(message_id, "message soft-deleted");
        Ok(message)
    }

    // ------------------------------------------------------------------
    // Attachments
    // ------------------------------------------------------------------

    /// Record an attachment reference against a live message.
    pub async fn add_attachment(
        &self,
        message_id: i64,
        kind: impl Into<String>,
        path: impl Into<String>,
        mime_type: Option<String>,
        size: Option<i64>,
        metadata: Metadata,
    ) -> Result<MessageAttachment> {
        self.get(message_id).await?;

        let sql = format!(
            "INSERT INTO {table} \
             (message_id, kind, path, mime_type, size, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) \
             RETURNING {ATTACHMENT_COLUMNS}",
            table = self.tables.message_attachments,
        );
        let attachment = sqlx::query_as::<_, MessageAttachment>(&sql)
            .bind(message_id)
            .bind(kind.into())
            .bind(path.into())
            .bind(mime_type)
            .bind(size)
            .bind(sqlx::types::Json(metadata))
            .fetch_one(&self.pool)
            .await?;
        Ok(attachment)
    }

    /// Attachments of a message, oldest first.
    pub async fn attachments(&self, message_id: i64) -> Result<Vec<MessageAttachment>> {
        let sql = format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM {table} WHERE message_id = $1 ORDER BY created_at, id",
            table = self.tables.message_attachments,
        );
        let attachments = sqlx::query_as::<_, MessageAttachment>(&sql)
            .bind(message_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(attachments)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn ensure_conversation(&self, conversation_id: i64) -> Result<()> {
        let sql = format!(
            "SELECT 1 FROM {table} WHERE id = $1 AND deleted_at IS NULL",
            table = self.tables.conversations,
        );
        let exists: Option<i32> = sqlx::query_scalar(&sql)
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("conversation {conversation_id}")));
        }
        Ok(())
    }

    async fn insert<'e, E>(&self, message: &Message, executor: E) -> Result<Message>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let sql = format!(
            "INSERT INTO {table} \
             (uuid, conversation_id, role, content, metadata, status, is_complete, \
              completed_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {MESSAGE_COLUMNS}",
            table = self.tables.messages,
        );
        let created = sqlx::query_as::<_, Message>(&sql)
            .bind(message.uuid)
            .bind(message.conversation_id)
            .bind(message.role)
            .bind(&message.content)
            .bind(&message.metadata)
            .bind(message.status)
            .bind(message.is_complete)
            .bind(message.completed_at)
            .bind(message.created_at)
            .bind(message.updated_at)
            .fetch_one(executor)
            .await
            .map_err(|e| map_constraint_violation(e, "message uuid already exists"))?;
        Ok(created)
    }

    /// Load a live message inside the transaction with a row lock, so
    /// lifecycle writes against it are serialized.
    async fn lock_message(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        message_id: i64,
    ) -> Result<Message> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM {table} \
             WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            table = self.tables.messages,
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(message_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("message {message_id}")))
    }

    async fn chunk_count(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        message_id: i64,
    ) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE message_id = $1",
            table = self.tables.message_chunks,
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(message_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(count)
    }

    async fn persist_terminal(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        message: &Message,
    ) -> Result<Message> {
        let sql = format!(
            "UPDATE {table} SET status = $2, is_complete = $3, completed_at = $4, \
             metadata = $5, updated_at = $6 \
             WHERE id = $1 \
             RETURNING {MESSAGE_COLUMNS}",
            table = self.tables.messages,
        );
        let updated = sqlx::query_as::<_, Message>(&sql)
            .bind(message.id)
            .bind(message.status)
            .bind(message.is_complete)
            .bind(message.completed_at)
            .bind(&message.metadata)
            .bind(message.updated_at)
            .fetch_one(&mut **tx)
            .await?;
        Ok(updated)
    }

    async fn list_by_completion(
        &self,
        conversation_id: i64,
        complete: bool,
    ) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM {table} \
             WHERE conversation_id = $1 AND is_complete = $2 AND deleted_at IS NULL \
             ORDER BY created_at, id",
            table = self.tables.messages,
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .bind(complete)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }
}
