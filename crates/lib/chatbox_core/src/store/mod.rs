//! Chat record persistence.
//!
//! Append-only: records are created once per successful exchange and never
//! updated or deleted. The only query lists everything in creation order.
//!
//! # Backends
//!
//! - [`postgres::PgChatStore`]: PostgreSQL table `chat_messages`
//! - [`memory::MemoryChatStore`]: process-local, for development and tests

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ChatRecord, NewChatRecord};

/// Errors raised by a chat store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("store call timed out")]
    Timeout,
}

/// Append/list store for chat records.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Append a record; the store assigns `id` and `created_at`.
    async fn append(&self, record: NewChatRecord) -> Result<ChatRecord, StoreError>;

    /// All records ordered by `created_at` ascending, ties broken by id.
    async fn list_all(&self) -> Result<Vec<ChatRecord>, StoreError>;
}
