//! Text generation: single-turn calls to a hosted generative model.
//!
//! Every call is independent: stored exchanges are never replayed to the
//! model. An empty answer is not an error; callers substitute
//! [`FALLBACK_REPLY`] via [`reply_or_fallback`].
//!
//! # Providers
//!
//! - [`gemini::GeminiClient`]: Google Gemini `generateContent` REST API

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ContentPart;

/// Reply stored and returned when the model produced no usable text.
pub const FALLBACK_REPLY: &str = "🤖 No reply.";

/// Errors raised by a text-generation call.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("model call timed out")]
    Timeout,

    #[error("model request failed: {0}")]
    Http(String),

    #[error("model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response could not be decoded: {0}")]
    Decode(String),

    #[error("model client misconfigured: {0}")]
    Config(String),
}

impl AiError {
    /// Whether the upstream rejected the call for quota reasons.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            AiError::Status { status, body } => {
                *status == 429 || body.contains("RESOURCE_EXHAUSTED")
            }
            _ => false,
        }
    }
}

/// Result of a generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedContent {
    text: Option<String>,
}

impl GeneratedContent {
    pub fn new(text: Option<String>) -> Self {
        Self { text }
    }

    /// Generated text, if the model produced any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

/// A hosted text-generation model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply for one user turn made of `parts`.
    async fn generate(&self, parts: &[ContentPart]) -> Result<GeneratedContent, AiError>;
}

/// Generated text as returned, or [`FALLBACK_REPLY`] when it is missing or
/// blank.
pub fn reply_or_fallback(content: &GeneratedContent) -> String {
    match content.text() {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => FALLBACK_REPLY.to_string(),
    }
}
