//! Request validation.
//!
//! Two policies are in use: "message or image" (either may be absent, not
//! both) and "strict" (message required and capped in length). The policy is
//! a value passed in by the caller so both stay selectable.

use thiserror::Error;

use crate::models::{ChatRequest, UploadedMedia};

/// Default message cap for the strict policy, in characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 500;

/// Reasons a chat request is rejected before any downstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message or image is required")]
    Empty,

    #[error("message is required")]
    MessageRequired,

    #[error("message is too long ({actual} characters, maximum {max})")]
    TooLong { max: usize, actual: usize },

    #[error("image uploads are not enabled")]
    UploadsDisabled,
}

/// Which requests are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Reject requests whose trimmed message is empty, even with an image.
    pub require_message: bool,
    /// Maximum trimmed message length in characters. `None` means no cap.
    pub max_message_chars: Option<usize>,
}

impl ValidationPolicy {
    /// Accept any request carrying a message, an image, or both.
    pub fn message_or_image() -> Self {
        Self {
            require_message: false,
            max_message_chars: None,
        }
    }

    /// Require a non-empty message of at most `max_chars` characters.
    pub fn strict(max_chars: usize) -> Self {
        Self {
            require_message: true,
            max_message_chars: Some(max_chars),
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::strict(DEFAULT_MAX_MESSAGE_CHARS)
    }
}

/// Normalize a raw submission into a [`ChatRequest`].
///
/// A missing message is treated as empty; an image with no bytes is treated as
/// absent.
pub fn validate(
    policy: &ValidationPolicy,
    raw_message: Option<&str>,
    image: Option<UploadedMedia>,
) -> Result<ChatRequest, ValidationError> {
    let message = raw_message.unwrap_or_default().trim().to_string();
    let image = image.filter(|m| !m.bytes.is_empty());

    if message.is_empty() {
        if policy.require_message {
            return Err(ValidationError::MessageRequired);
        }
        if image.is_none() {
            return Err(ValidationError::Empty);
        }
    }

    if let Some(max) = policy.max_message_chars {
        let actual = message.chars().count();
        if actual > max {
            return Err(ValidationError::TooLong { max, actual });
        }
    }

    Ok(ChatRequest { message, image })
}
