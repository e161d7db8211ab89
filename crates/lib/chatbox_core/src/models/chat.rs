//! Chat exchange models.
//!
//! A chat exchange is a single user message (optionally with an image) and the
//! model's reply. Exchanges are independent: there is no conversation entity.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Binary upload attached to a chat request. Lives for one request only.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub bytes: Bytes,
    pub mime_type: String,
    pub original_name: String,
}

impl std::fmt::Debug for UploadedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedMedia")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("original_name", &self.original_name)
            .finish()
    }
}

/// A validated chat request. Only the validator constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Trimmed message, possibly empty when an image is present.
    pub message: String,
    pub image: Option<UploadedMedia>,
}

/// A unit of input to the text-generation model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Bytes },
}

impl ChatRequest {
    /// Content parts sent to the model: the text (if any), then the image.
    pub fn content_parts(&self) -> Vec<ContentPart> {
        let mut parts = Vec::with_capacity(2);
        if !self.message.is_empty() {
            parts.push(ContentPart::Text(self.message.clone()));
        }
        if let Some(image) = &self.image {
            parts.push(ContentPart::InlineData {
                mime_type: image.mime_type.clone(),
                data: image.bytes.clone(),
            });
        }
        parts
    }
}

/// Fields of a record about to be appended; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatRecord {
    pub user_message: String,
    pub image: Option<String>,
    pub ai_reply: String,
}

/// A persisted chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: Uuid,
    pub user_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(rename = "image_url")]
    pub image: Option<String>,
    pub ai_reply: String,
    pub created_at: DateTime<Utc>,
}
