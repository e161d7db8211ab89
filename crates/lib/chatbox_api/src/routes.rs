//! Route paths.

/// Chat exchange endpoint (`GET` lists, `POST` submits).
pub const API_CHAT: &str = "/api/chat";
