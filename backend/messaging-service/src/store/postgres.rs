use super::{MessageStore, RelationStore, SortOrder};
use crate::error::{AppError, AppResult};
use crate::models::{CommunicationRelation, ConversationKey, Message, MessageType, NewMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, message_type, text_content, media_path, created_at";

/// Both directions of a pair; binds $1 = key.low, $2 = key.high
const PAIR_FILTER: &str =
    "((sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1))";

fn message_from_row(row: &PgRow) -> AppResult<Message> {
    let raw_type: String = row.try_get("message_type")?;
    let message_type = MessageType::parse(&raw_type).ok_or_else(|| {
        AppError::StoreUnavailable(format!("unknown message_type in store: {raw_type}"))
    })?;

    Ok(Message {
        id: row.try_get("id")?,
        sender_id: row.try_get("sender_id")?,
        receiver_id: row.try_get("receiver_id")?,
        message_type,
        text_content: row.try_get("text_content")?,
        media_path: row.try_get("media_path")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, message: NewMessage) -> AppResult<Message> {
        let row = sqlx::query(
            r#"
            INSERT INTO messages (sender_id, receiver_id, message_type, text_content, media_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at
            "#,
        )
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(message.message_type.as_str())
        .bind(&message.text_content)
        .bind(&message.media_path)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get("id")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;

        Ok(Message {
            id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            message_type: message.message_type,
            text_content: message.text_content,
            media_path: message.media_path,
            created_at,
        })
    }

    async fn delete_by_id(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(message_from_row).transpose()
    }

    async fn find_ids_between(&self, key: &ConversationKey, order: SortOrder) -> AppResult<Vec<i64>> {
        let dir = order.as_sql();
        let sql = format!(
            "SELECT id FROM messages WHERE {PAIR_FILTER} ORDER BY created_at {dir}, id {dir}"
        );
        let ids: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(key.low())
            .bind(key.high())
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn find_messages_between(
        &self,
        key: &ConversationKey,
        order: SortOrder,
        limit: Option<usize>,
    ) -> AppResult<Vec<Message>> {
        let dir = order.as_sql();
        // LIMIT NULL means no limit in Postgres
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE {PAIR_FILTER} \
             ORDER BY created_at {dir}, id {dir} LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(key.low())
            .bind(key.high())
            .bind(limit.map(|l| l as i64))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn find_last_between(&self, key: &ConversationKey) -> AppResult<Option<Message>> {
        Ok(self
            .find_messages_between(key, SortOrder::Desc, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn count_from_to(&self, sender_id: Uuid, receiver_id: Uuid) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::bigint FROM messages WHERE sender_id = $1 AND receiver_id = $2",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn distinct_pairs(&self) -> AppResult<Vec<ConversationKey>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT
                LEAST(sender_id, receiver_id) AS user_low,
                GREATEST(sender_id, receiver_id) AS user_high
            FROM messages
            WHERE sender_id <> receiver_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let low: Uuid = row.try_get("user_low")?;
                let high: Uuid = row.try_get("user_high")?;
                ConversationKey::new(low, high)
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct PgRelationStore {
    pool: PgPool,
}

impl PgRelationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationStore for PgRelationStore {
    async fn find(&self, key: &ConversationKey) -> AppResult<Option<CommunicationRelation>> {
        let row = sqlx::query(
            r#"
            SELECT can_communicate, established_at, updated_at
            FROM communication_relations
            WHERE user_low = $1 AND user_high = $2
            "#,
        )
        .bind(key.low())
        .bind(key.high())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(CommunicationRelation {
                key: *key,
                can_communicate: row.try_get("can_communicate")?,
                established_at: row.try_get("established_at")?,
                updated_at: row.try_get("updated_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn upsert(&self, relation: &CommunicationRelation) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO communication_relations
                (user_low, user_high, can_communicate, established_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_low, user_high) DO UPDATE
            SET can_communicate = EXCLUDED.can_communicate,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(relation.key.low())
        .bind(relation.key.high())
        .bind(relation.can_communicate)
        .bind(relation.established_at)
        .bind(relation.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
