//! API server configuration.

use std::str::FromStr;
use std::time::Duration;

use chatbox_core::ai::gemini;
use chatbox_core::media::gcs;
use chatbox_core::ratelimit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, RateLimitConfig};
use chatbox_core::validation::{DEFAULT_MAX_MESSAGE_CHARS, ValidationPolicy};
use tracing::warn;

/// Default request body cap (10 MiB), sized for one image upload.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default bound on each upstream call, in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3000").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Gemini API key. Empty disables real model calls.
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Cloud Storage bucket for images. `None` disables uploads.
    pub storage_bucket: Option<String>,
    pub storage_access_token: Option<String>,
    pub storage_endpoint: String,
    /// Error-monitoring endpoint. `None` disables monitoring.
    pub monitoring_dsn: Option<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit: RateLimitConfig,
    pub validation: ValidationPolicy,
    pub max_upload_bytes: usize,
    pub upstream_timeout: Duration,
    /// Use the first `X-Forwarded-For` entry as the client address.
    pub trust_forwarded_for: bool,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("storage_bucket", &self.storage_bucket)
            .field("storage_endpoint", &self.storage_endpoint)
            .field("monitoring_enabled", &self.monitoring_dsn.is_some())
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("rate_limit", &self.rate_limit)
            .field("validation", &self.validation)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish_non_exhaustive()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            database_url: "postgres://localhost:5432/chatbox".into(),
            gemini_api_key: String::new(),
            gemini_model: gemini::DEFAULT_MODEL.into(),
            gemini_base_url: gemini::DEFAULT_BASE_URL.into(),
            storage_bucket: None,
            storage_access_token: None,
            storage_endpoint: gcs::DEFAULT_ENDPOINT.into(),
            monitoring_dsn: None,
            rate_limit_enabled: true,
            rate_limit: RateLimitConfig::default(),
            validation: ValidationPolicy::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            trust_forwarded_for: false,
        }
    }
}

/// Non-empty value of `name`, if set.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `name`, falling back to `default` when unset or invalid.
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match env_opt(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "invalid value, using default");
            default
        }),
        None => default,
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                  | Default                                     |
    /// |---------------------------|---------------------------------------------|
    /// | `BIND_ADDR`               | `127.0.0.1:3000`                            |
    /// | `DATABASE_URL`            | `postgres://localhost:5432/chatbox`         |
    /// | `GEMINI_API_KEY`          | empty                                       |
    /// | `GEMINI_MODEL`            | `gemini-2.5-flash-lite`                     |
    /// | `GEMINI_BASE_URL`         | `https://generativelanguage.googleapis.com` |
    /// | `STORAGE_BUCKET`          | unset (uploads disabled)                    |
    /// | `STORAGE_ACCESS_TOKEN`    | unset                                       |
    /// | `STORAGE_ENDPOINT`        | `https://storage.googleapis.com`            |
    /// | `MONITORING_DSN`          | unset (monitoring disabled)                 |
    /// | `RATE_LIMIT_ENABLED`      | `true`                                      |
    /// | `RATE_LIMIT_WINDOW_SECS`  | `60`                                        |
    /// | `RATE_LIMIT_MAX_REQUESTS` | `10`                                        |
    /// | `REQUIRE_MESSAGE`         | `true`                                      |
    /// | `MAX_MESSAGE_CHARS`       | `500` (`0` = no cap)                        |
    /// | `MAX_UPLOAD_BYTES`        | `10485760`                                  |
    /// | `UPSTREAM_TIMEOUT_SECS`   | `30`                                        |
    /// | `TRUST_FORWARDED_FOR`     | `false`                                     |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_chars = env_parse("MAX_MESSAGE_CHARS", DEFAULT_MAX_MESSAGE_CHARS);
        let validation = ValidationPolicy {
            require_message: env_parse("REQUIRE_MESSAGE", true),
            max_message_chars: (max_chars > 0).then_some(max_chars),
        };

        let window_secs = env_parse("RATE_LIMIT_WINDOW_SECS", DEFAULT_WINDOW.as_secs()).max(1);

        Self {
            bind_addr: env_opt("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: env_opt("DATABASE_URL").unwrap_or(defaults.database_url),
            gemini_api_key: env_opt("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: env_opt("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: env_opt("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            storage_bucket: env_opt("STORAGE_BUCKET"),
            storage_access_token: env_opt("STORAGE_ACCESS_TOKEN"),
            storage_endpoint: env_opt("STORAGE_ENDPOINT").unwrap_or(defaults.storage_endpoint),
            monitoring_dsn: env_opt("MONITORING_DSN"),
            rate_limit_enabled: env_parse("RATE_LIMIT_ENABLED", true),
            rate_limit: RateLimitConfig {
                max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS),
                window: Duration::from_secs(window_secs),
            },
            validation,
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            upstream_timeout: Duration::from_secs(
                env_parse("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS).max(1),
            ),
            trust_forwarded_for: env_parse("TRUST_FORWARDED_FOR", false),
        }
    }
}
