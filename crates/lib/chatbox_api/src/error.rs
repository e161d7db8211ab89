//! Application error types.
//!
//! Every failure response carries `error` (machine-readable kind), `message`
//! (safe detail) and `aiReply` (a human-readable fallback for chat clients
//! that only render the reply field). Internal details stay in the log.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chatbox_core::pipeline::PipelineError;
use serde::Serialize;
use thiserror::Error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Body of every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub ai_reply: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Rate limit exceeded")]
    RateLimited { limit: u64, retry_after: u64 },

    #[error("AI service unavailable: {0}")]
    AiUnavailable(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Carries a client-safe summary; the underlying cause is logged upstream.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, String) {
        match self {
            AppError::Validation(m) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                m.clone(),
                format!("⚠️ {}", sentence(m)),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "Request body is too large".into(),
                "⚠️ That file is too large.".into(),
            ),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests".into(),
                "⚠️ Too many requests, please try again later.".into(),
            ),
            AppError::AiUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                "ai_unavailable",
                "AI service unavailable".into(),
                "⚠️ The AI service is unavailable right now.".into(),
            ),
            AppError::UploadFailed(_) => (
                StatusCode::BAD_GATEWAY,
                "upload_failed",
                "Image upload failed".into(),
                "⚠️ Image upload failed.".into(),
            ),
            AppError::Persistence(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence_error",
                m.clone(),
                format!("⚠️ {}", sentence(m)),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".into(),
                "⚠️ Something went wrong.".into(),
            ),
        }
    }
}

/// Capitalize the first letter and end with a period.
fn sentence(s: &str) -> String {
    let mut chars = s.chars();
    let mut out: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => return "Something went wrong.".into(),
    };
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, ai_reply) = self.parts();
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
            ai_reply,
        });
        let mut response = (status, body).into_response();

        if let AppError::RateLimited { limit, retry_after } = self {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(0u64));
        }

        response
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Validation(v) => AppError::Validation(v.to_string()),
            PipelineError::Ai(e) => AppError::AiUnavailable(e.to_string()),
            PipelineError::Media(e) => AppError::UploadFailed(e.to_string()),
            PipelineError::Store(_) => AppError::Persistence("failed to save message".into()),
        }
    }
}
