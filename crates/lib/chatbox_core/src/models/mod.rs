//! Domain models.

pub mod chat;

pub use chat::{ChatRecord, ChatRequest, ContentPart, NewChatRecord, UploadedMedia};
