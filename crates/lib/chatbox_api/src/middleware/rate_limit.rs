//! Rate-limit gate in front of the chat routes.
//!
//! Clients are identified by peer address, or by the first `X-Forwarded-For`
//! entry when the server sits behind a trusted proxy.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

/// Bucket for requests whose origin cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the rate-limit key for a request.
pub fn client_id(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for
        && let Some(forwarded) = first_forwarded_for(request.headers())
    {
        return forwarded;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |ci| ci.0.ip().to_string())
}

fn first_forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Axum middleware: counts the request against the client's window and
/// answers 429 once the window is used up. Pass-through when disabled.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let client = client_id(&request, state.config.trust_forwarded_for);
    let status = limiter.check(&client).map_err(|exceeded| {
        warn!(%client, limit = exceeded.limit, "rate limit exceeded");
        AppError::RateLimited {
            limit: exceeded.limit,
            retry_after: exceeded.retry_after,
        }
    })?;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(status.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(status.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(status.reset_after));
    Ok(response)
}
