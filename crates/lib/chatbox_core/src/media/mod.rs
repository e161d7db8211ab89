//! Media upload: turns an uploaded image into a public URL.
//!
//! The raw bytes are handed to a [`BlobStore`] and dropped afterwards; only
//! the resulting URL is persisted.
//!
//! # Object keys
//!
//! `"{unix_millis}-{content hash}-{sanitized filename}"`. The content hash
//! keeps two different files with the same name in the same millisecond
//! apart. Identical bytes under the same name and millisecond still map to
//! the same key, which is harmless.

pub mod gcs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::models::UploadedMedia;

/// Hex characters of the content hash kept in the object key.
const KEY_HASH_LEN: usize = 12;

/// Errors raised by the blob store.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("storage call timed out")]
    Timeout,

    #[error("storage request failed: {0}")]
    Http(String),

    #[error("storage returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("storage misconfigured: {0}")]
    Config(String),
}

/// Object storage returning durable public URLs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key` in one non-resumable request.
    async fn upload(
        &self,
        key: &str,
        bytes: bytes::Bytes,
        mime_type: &str,
    ) -> Result<(), MediaError>;

    /// Grant public read access to `key`.
    async fn make_public(&self, key: &str) -> Result<(), MediaError>;

    /// Canonical public URL of `key`.
    fn public_url(&self, key: &str) -> String;
}

fn sanitize_filename(name: &str) -> String {
    // Browsers may send a full client path.
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Build the object key for an upload made at `now`.
pub fn object_key(now: DateTime<Utc>, bytes: &[u8], original_name: &str) -> String {
    let digest = Sha256::digest(bytes);
    let hash: String = digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(KEY_HASH_LEN)
        .collect();
    format!(
        "{}-{}-{}",
        now.timestamp_millis(),
        hash,
        sanitize_filename(original_name)
    )
}

/// Upload `media`, make it public and return its URL.
pub async fn upload_media(
    store: &dyn BlobStore,
    media: &UploadedMedia,
    now: DateTime<Utc>,
) -> Result<String, MediaError> {
    let key = object_key(now, &media.bytes, &media.original_name);
    store
        .upload(&key, media.bytes.clone(), &media.mime_type)
        .await?;
    store.make_public(&key).await?;
    let url = store.public_url(&key);
    debug!(%key, %url, size = media.bytes.len(), "media uploaded");
    Ok(url)
}
