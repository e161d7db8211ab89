//! In-memory chat store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ChatStore, StoreError};
use crate::models::{ChatRecord, NewChatRecord};
use crate::uuid::uuidv7;

/// Process-local chat store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    records: RwLock<Vec<ChatRecord>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn append(&self, record: NewChatRecord) -> Result<ChatRecord, StoreError> {
        let mut records = self.records.write().await;
        // Timestamp taken under the write lock so insertion order matches it.
        let row = ChatRecord {
            id: uuidv7(),
            user_message: record.user_message,
            image: record.image,
            ai_reply: record.ai_reply,
            created_at: Utc::now(),
        };
        records.push(row.clone());
        Ok(row)
    }

    async fn list_all(&self) -> Result<Vec<ChatRecord>, StoreError> {
        let mut rows = self.records.read().await.clone();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}
