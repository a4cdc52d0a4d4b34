//! Conversation repository: creation, lookup, and the cascade
//! delete/restore protocol between a conversation and its messages.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use colloquy_common::{map_constraint_violation, Error, Result, TableConfig};

use crate::domain::entities::{Conversation, Metadata};
use crate::events::{ConverseEvent, EventSink};
use crate::owner::OwnerRef;

pub(crate) const CONVERSATION_COLUMNS: &str =
    "id, uuid, owner_kind, owner_id, title, metadata, context, created_at, updated_at, deleted_at";

/// Attributes for a new conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationAttrs {
    pub title: Option<String>,
    pub metadata: Metadata,
    pub context: Metadata,
}

impl ConversationAttrs {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
    tables: TableConfig,
    events: Arc<dyn EventSink>,
}

impl ConversationRepository {
    pub fn new(pool: PgPool, tables: TableConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            pool,
            tables,
            events,
        }
    }

    /// Create a conversation, optionally attached to an owner.
    pub async fn create(
        &self,
        owner: Option<&OwnerRef>,
        attrs: ConversationAttrs,
    ) -> Result<Conversation> {
        let conv = Conversation::new(owner, attrs.title, attrs.metadata, attrs.context);

        let sql = format!(
            "INSERT INTO {table} \
             (uuid, owner_kind, owner_id, title, metadata, context, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {CONVERSATION_COLUMNS}",
            table = self.tables.conversations,
        );
        let created = sqlx::query_as::<_, Conversation>(&sql)
            .bind(conv.uuid)
            .bind(&conv.owner_kind)
            .bind(&conv.owner_id)
            .bind(&conv.title)
            .bind(&conv.metadata)
            .bind(&conv.context)
            .bind(conv.created_at)
            .bind(conv.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_constraint_violation(e, "conversation uuid already exists"))?;

        tracing::info!(
            conversation_id = created.id,
            uuid = %created.uuid,
            "conversation created"
        );
        self.events
            .publish(ConverseEvent::conversation_created(&created))
            .await;

        Ok(created)
    }

    /// Find a live conversation by id.
    pub async fn find(&self, id: i64) -> Result<Option<Conversation>> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM {table} WHERE id = $1 AND deleted_at IS NULL",
            table = self.tables.conversations,
        );
        let conv = sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(conv)
    }

    /// Find a live conversation by its externally-stable uuid.
    pub async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Conversation>> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM {table} WHERE uuid = $1 AND deleted_at IS NULL",
            table = self.tables.conversations,
        );
        let conv = sqlx::query_as::<_, Conversation>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(conv)
    }

    /// Fetch a live conversation by id, failing with `NotFound` if absent.
    pub async fn get(&self, id: i64) -> Result<Conversation> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))
    }

    /// List live conversations for an owner, oldest first.
    pub async fn list_for_owner(&self, owner: &OwnerRef) -> Result<Vec<Conversation>> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM {table} \
             WHERE owner_kind = $1 AND owner_id = $2 AND deleted_at IS NULL \
             ORDER BY created_at, id",
            table = self.tables.conversations,
        );
        let convs = sqlx::query_as::<_, Conversation>(&sql)
            .bind(&owner.kind)
            .bind(&owner.id)
            .fetch_all(&self.pool)
            .await?;
        Ok(convs)
    }

    /// Update the title of a live conversation.
    pub async fn update_title(&self, id: i64, title: Option<String>) -> Result<Conversation> {
        let sql = format!(
            "UPDATE {table} SET title = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {CONVERSATION_COLUMNS}",
            table = self.tables.conversations,
        );
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .bind(title)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))
    }

    /// Replace the metadata map of a live conversation.
    pub async fn update_metadata(&self, id: i64, metadata: Metadata) -> Result<Conversation> {
        let sql = format!(
            "UPDATE {table} SET metadata = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {CONVERSATION_COLUMNS}",
            table = self.tables.conversations,
        );
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .bind(sqlx::types::Json(metadata))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))
    }

    /// Replace the context map of a live conversation.
    pub async fn update_context(&self, id: i64, context: Metadata) -> Result<Conversation> {
        let sql = format!(
            "UPDATE {table} SET context = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {CONVERSATION_COLUMNS}",
            table = self.tables.conversations,
        );
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .bind(sqlx::types::Json(context))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))
    }

    /// Soft-delete: tombstone the conversation and every currently-live
    /// message it owns, atomically and with the same timestamp.
    pub async fn delete(&self, id: i64) -> Result<Conversation> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE {table} SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {CONVERSATION_COLUMNS}",
            table = self.tables.conversations,
        );
        let conv = sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))?;

        let sql = format!(
            "UPDATE {table} SET deleted_at = $2, updated_at = $2 \
             WHERE conversation_id = $1 AND deleted_at IS NULL",
            table = self.tables.messages,
        );
        let cascaded = sqlx::query(&sql)
            .bind(id)
            .bind(conv.deleted_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            conversation_id = id,
            messages = cascaded.rows_affected(),
            "conversation soft-deleted with message cascade"
        );
        Ok(conv)
    }

    /// Restore a soft-deleted conversation. Only messages tombstoned at or
    /// after the conversation's own tombstone are restored; messages deleted
    /// independently beforehand stay deleted.
    pub async fn restore(&self, id: i64) -> Result<Conversation> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM {table} \
             WHERE id = $1 AND deleted_at IS NOT NULL FOR UPDATE",
            table = self.tables.conversations,
        );
        let conv = sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("trashed conversation {id}")))?;

        let sql = format!(
            "UPDATE {table} SET deleted_at = NULL, updated_at = NOW() \
             WHERE conversation_id = $1 AND deleted_at >= $2",
            table = self.tables.messages,
        );
        let restored_messages = sqlx::query(&sql)
            .bind(id)
            .bind(conv.deleted_at)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "UPDATE {table} SET deleted_at = NULL, updated_at = NOW() \
             WHERE id = $1 RETURNING {CONVERSATION_COLUMNS}",
            table = self.tables.conversations,
        );
        let restored = sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            conversation_id = id,
            messages = restored_messages.rows_affected(),
            "conversation restored with message cascade"
        );
        Ok(restored)
    }

    /// Permanently remove the conversation. Messages, chunks, and
    /// attachments are removed by the storage-level ON DELETE CASCADE.
    pub async fn force_delete(&self, id: i64) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {table} WHERE id = $1",
            table = self.tables.conversations,
        );
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;

        if result.rows_affected() > 0 {
            tracing::info!(conversation_id = id, "conversation permanently deleted");
        }
        Ok(result.rows_affected() > 0)
    }

    /// Permanently remove conversations soft-deleted before the cutoff.
    pub async fn prune(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {table} WHERE deleted_at IS NOT NULL AND deleted_at < $1",
            table = self.tables.conversations,
        );
        let result = sqlx::query(&sql)
            .bind(older_than)
            .execute(&self.pool)
            .await?;

        tracing::info!(pruned = result.rows_affected(), "pruned trashed conversations");
        Ok(result.rows_affected())
    }
}
