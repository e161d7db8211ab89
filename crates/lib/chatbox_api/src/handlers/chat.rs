//! Chat handlers.
//!
//! `POST /api/chat` accepts either a JSON body (`{"message": "..."}`) or a
//! multipart form with a `message` text field and an optional `image` file
//! field. `GET /api/chat` returns every stored exchange, oldest first.

use axum::Json;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{StatusCode, header};
use bytes::Bytes;
use chatbox_core::models::{ChatRecord, UploadedMedia};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Name of the multipart field carrying the message.
const MESSAGE_FIELD: &str = "message";
/// Name of the multipart field carrying the image.
const IMAGE_FIELD: &str = "image";

/// JSON form of a chat submission.
#[derive(Debug, Deserialize)]
struct ChatBody {
    message: Option<String>,
}

/// A chat submission as received, before validation.
#[derive(Debug, Default)]
pub struct ChatSubmission {
    pub message: Option<String>,
    pub image: Option<UploadedMedia>,
}

fn rejection(status: StatusCode, text: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::Validation(text)
    }
}

impl ChatSubmission {
    async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut submission = ChatSubmission::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| rejection(e.status(), e.body_text()))?
        {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some(MESSAGE_FIELD) => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| rejection(e.status(), e.body_text()))?;
                    submission.message = Some(text);
                }
                Some(IMAGE_FIELD) if submission.image.is_none() => {
                    let original_name = field.file_name().unwrap_or("upload").to_string();
                    let mime_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes: Bytes = field
                        .bytes()
                        .await
                        .map_err(|e| rejection(e.status(), e.body_text()))?;
                    submission.image = Some(UploadedMedia {
                        bytes,
                        mime_type,
                        original_name,
                    });
                }
                other => debug!(field = ?other, "ignoring multipart field"),
            }
        }

        Ok(submission)
    }
}

impl<S> FromRequest<S> for ChatSubmission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| rejection(e.status(), e.body_text()))?;
            Self::from_multipart(multipart).await
        } else {
            let Json(body) = Json::<ChatBody>::from_request(req, state)
                .await
                .map_err(|e| rejection(e.status(), e.body_text()))?;
            Ok(ChatSubmission {
                message: body.message,
                image: None,
            })
        }
    }
}

/// Successful `POST /api/chat` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub id: Uuid,
    pub user_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub ai_reply: String,
}

impl From<ChatRecord> for ChatReply {
    fn from(record: ChatRecord) -> Self {
        Self {
            id: record.id,
            user_message: record.user_message,
            image: record.image,
            ai_reply: record.ai_reply,
        }
    }
}

/// `POST /api/chat`: validate, ask the model, store and return the exchange.
pub async fn send_message_handler(
    State(state): State<AppState>,
    submission: ChatSubmission,
) -> AppResult<Json<ChatReply>> {
    let record = state
        .pipeline
        .submit(submission.message.as_deref(), submission.image)
        .await?;
    Ok(Json(record.into()))
}

/// `GET /api/chat`: list every stored exchange, oldest first.
pub async fn list_messages_handler(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ChatRecord>>> {
    let records = state
        .pipeline
        .history()
        .await
        .map_err(|_| AppError::Persistence("failed to fetch messages".into()))?;
    Ok(Json(records))
}
