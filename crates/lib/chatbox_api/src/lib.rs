//! # chatbox_api
//!
//! HTTP API library for Chatbox.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use chatbox_core::pipeline::ChatPipeline;
use chatbox_core::ratelimit::RateLimiter;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::chat;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Validation, model, upload and persistence chain.
    pub pipeline: ChatPipeline,
    /// `None` when rate limiting is disabled.
    pub rate_limiter: Option<Arc<RateLimiter>>,
    /// API configuration.
    pub config: ApiConfig,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let chat_routes = Router::new()
        .route(
            routes::API_CHAT,
            get(chat::list_messages_handler).post(chat::send_message_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::enforce_rate_limit,
        ));

    Router::new()
        .merge(chat_routes)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
