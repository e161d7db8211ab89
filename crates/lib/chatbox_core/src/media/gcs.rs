//! Google Cloud Storage blob store (JSON API).
//!
//! Uploads with `uploadType=media` (single request, non-resumable) and grants
//! `allUsers:READER` through the object ACL endpoint. The endpoint can point
//! at `fake-gcs-server` for local runs.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use url::Url;

use super::{BlobStore, MediaError};

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Host serving public objects.
pub const PUBLIC_HOST: &str = "https://storage.googleapis.com";

/// Settings for [`GcsBlobStore`].
#[derive(Clone)]
pub struct GcsConfig {
    pub bucket: String,
    /// OAuth2 bearer token. `None` for emulators that skip auth.
    pub access_token: Option<String>,
    pub endpoint: String,
}

impl std::fmt::Debug for GcsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsConfig")
            .field("bucket", &self.bucket)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl GcsConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            access_token: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

#[derive(Serialize)]
struct AclEntry<'a> {
    entity: &'a str,
    role: &'a str,
}

/// Cloud Storage client for a single bucket.
#[derive(Debug, Clone)]
pub struct GcsBlobStore {
    client: Client,
    config: GcsConfig,
    public_base: Url,
}

impl GcsBlobStore {
    pub fn new(client: Client, config: GcsConfig) -> Result<Self, MediaError> {
        if config.bucket.is_empty() {
            return Err(MediaError::Config("bucket name is empty".into()));
        }
        Url::parse(&config.endpoint)
            .map_err(|e| MediaError::Config(format!("invalid storage endpoint: {e}")))?;
        let public_base = Url::parse(PUBLIC_HOST)
            .map_err(|e| MediaError::Config(format!("invalid public host: {e}")))?;
        Ok(Self {
            client,
            config,
            public_base,
        })
    }

    /// `{endpoint}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, MediaError> {
        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|e| MediaError::Config(format!("invalid storage endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| MediaError::Config("storage endpoint cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(req: RequestBuilder) -> Result<Response, MediaError> {
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                MediaError::Timeout
            } else {
                MediaError::Http(e.to_string())
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(MediaError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn upload(&self, key: &str, bytes: Bytes, mime_type: &str) -> Result<(), MediaError> {
        let url = self.url(&["upload", "storage", "v1", "b", &self.config.bucket, "o"])?;
        let req = self
            .client
            .post(url)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes);
        Self::send(self.authorize(req)).await?;
        Ok(())
    }

    async fn make_public(&self, key: &str) -> Result<(), MediaError> {
        let url = self.url(&["storage", "v1", "b", &self.config.bucket, "o", key, "acl"])?;
        let req = self.client.post(url).json(&AclEntry {
            entity: "allUsers",
            role: "READER",
        });
        Self::send(self.authorize(req)).await?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        let mut url = self.public_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.config.bucket).push(key);
        }
        url.to_string()
    }
}
