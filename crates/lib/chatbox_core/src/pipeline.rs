//! Chat exchange pipeline.
//!
//! One submission runs validate → generate → upload (image only) → append, in
//! that order. A failing stage stops the chain, so a rejected or failed
//! request never reaches the store. Each external call is bounded by the
//! configured timeout and failures are logged and reported where they occur.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::ai::{AiError, TextGenerator, reply_or_fallback};
use crate::media::{BlobStore, MediaError, upload_media};
use crate::models::{ChatRecord, NewChatRecord, UploadedMedia};
use crate::monitoring::{Component, ErrorEvent, ErrorReporter, NoopReporter};
use crate::store::{ChatStore, StoreError};
use crate::validation::{ValidationError, ValidationPolicy, validate};

/// Default bound on each external call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure of a pipeline run, by originating stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("AI service error: {0}")]
    Ai(#[from] AiError),

    #[error("upload error: {0}")]
    Media(#[from] MediaError),

    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

/// Validation, generation, upload and persistence wired together.
#[derive(Clone)]
pub struct ChatPipeline {
    generator: Arc<dyn TextGenerator>,
    blob_store: Option<Arc<dyn BlobStore>>,
    store: Arc<dyn ChatStore>,
    reporter: Arc<dyn ErrorReporter>,
    policy: ValidationPolicy,
    call_timeout: Duration,
}

impl std::fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("uploads_enabled", &self.blob_store.is_some())
            .field("policy", &self.policy)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl ChatPipeline {
    /// Pipeline with uploads disabled, monitoring off and the default policy.
    pub fn new(generator: Arc<dyn TextGenerator>, store: Arc<dyn ChatStore>) -> Self {
        Self {
            generator,
            blob_store: None,
            store,
            reporter: Arc::new(NoopReporter),
            policy: ValidationPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Enable image uploads through `blob_store`.
    #[must_use]
    pub fn with_blob_store(mut self, blob_store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn uploads_enabled(&self) -> bool {
        self.blob_store.is_some()
    }

    fn fail<E>(&self, component: Component, err: E) -> PipelineError
    where
        E: Into<PipelineError> + std::fmt::Display,
    {
        error!(component = ?component, error = %err, "chat pipeline stage failed");
        self.reporter.report(ErrorEvent::new(component, err.to_string()));
        err.into()
    }

    /// Run one chat exchange and return the stored record.
    pub async fn submit(
        &self,
        raw_message: Option<&str>,
        image: Option<UploadedMedia>,
    ) -> Result<ChatRecord, PipelineError> {
        let request = validate(&self.policy, raw_message, image)?;
        if request.image.is_some() && self.blob_store.is_none() {
            return Err(ValidationError::UploadsDisabled.into());
        }

        let parts = request.content_parts();
        let content = match timeout(self.call_timeout, self.generator.generate(&parts)).await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                if e.is_quota_exhausted() {
                    warn!("AI quota exhausted");
                }
                return Err(self.fail(Component::Ai, e));
            }
            Err(_) => return Err(self.fail(Component::Ai, AiError::Timeout)),
        };
        let ai_reply = reply_or_fallback(&content);

        let image_url = match (&request.image, &self.blob_store) {
            (Some(media), Some(blob_store)) => {
                let upload = upload_media(blob_store.as_ref(), media, Utc::now());
                match timeout(self.call_timeout, upload).await {
                    Ok(Ok(url)) => Some(url),
                    Ok(Err(e)) => return Err(self.fail(Component::Media, e)),
                    Err(_) => return Err(self.fail(Component::Media, MediaError::Timeout)),
                }
            }
            _ => None,
        };

        let new_record = NewChatRecord {
            user_message: request.message,
            image: image_url,
            ai_reply,
        };
        let record = match timeout(self.call_timeout, self.store.append(new_record)).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => return Err(self.fail(Component::Store, e)),
            Err(_) => return Err(self.fail(Component::Store, StoreError::Timeout)),
        };

        info!(id = %record.id, has_image = record.image.is_some(), "chat exchange stored");
        Ok(record)
    }

    /// Every stored exchange, oldest first.
    pub async fn history(&self) -> Result<Vec<ChatRecord>, PipelineError> {
        match timeout(self.call_timeout, self.store.list_all()).await {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(e)) => Err(self.fail(Component::Store, e)),
            Err(_) => Err(self.fail(Component::Store, StoreError::Timeout)),
        }
    }
}
