//! PostgreSQL chat store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{ChatStore, StoreError};
use crate::models::{ChatRecord, NewChatRecord};
use crate::uuid::uuidv7;

/// Chat store backed by the `chat_messages` table.
#[derive(Debug, Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn append(&self, record: NewChatRecord) -> Result<ChatRecord, StoreError> {
        let row = sqlx::query_as::<_, ChatRecord>(
            r#"
            INSERT INTO chat_messages (id, user_message, image_url, ai_reply)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_message, image_url, ai_reply, created_at
            "#,
        )
        .bind(uuidv7())
        .bind(&record.user_message)
        .bind(&record.image)
        .bind(&record.ai_reply)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_all(&self) -> Result<Vec<ChatRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ChatRecord>(
            r#"
            SELECT id, user_message, image_url, ai_reply, created_at
            FROM chat_messages
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
