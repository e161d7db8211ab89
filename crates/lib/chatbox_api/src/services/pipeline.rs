//! Builds the chat pipeline and its collaborators from [`ApiConfig`].

use std::sync::Arc;

use chatbox_core::ai::gemini::{GeminiClient, GeminiConfig};
use chatbox_core::media::gcs::{GcsBlobStore, GcsConfig};
use chatbox_core::media::MediaError;
use chatbox_core::monitoring::reporter_from_dsn;
use chatbox_core::pipeline::ChatPipeline;
use chatbox_core::ratelimit::RateLimiter;
use chatbox_core::store::ChatStore;
use reqwest::Client;
use tracing::{info, warn};

use crate::AppState;
use crate::config::ApiConfig;

/// Assemble the pipeline: Gemini for replies, Cloud Storage for images when a
/// bucket is configured, and an HTTP error reporter when a DSN is set.
pub fn build_pipeline(
    config: &ApiConfig,
    client: Client,
    store: Arc<dyn ChatStore>,
) -> Result<ChatPipeline, MediaError> {
    if config.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY is not set; chat requests will fail with 502");
    }

    let generator = GeminiClient::new(
        client.clone(),
        GeminiConfig {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            base_url: config.gemini_base_url.clone(),
        },
    );

    let reporter = reporter_from_dsn(client.clone(), config.monitoring_dsn.as_deref());

    let mut pipeline = ChatPipeline::new(Arc::new(generator), store)
        .with_policy(config.validation)
        .with_reporter(reporter)
        .with_call_timeout(config.upstream_timeout);

    match &config.storage_bucket {
        Some(bucket) => {
            let blob_store = GcsBlobStore::new(
                client,
                GcsConfig {
                    bucket: bucket.clone(),
                    access_token: config.storage_access_token.clone(),
                    endpoint: config.storage_endpoint.clone(),
                },
            )?;
            info!(%bucket, "image uploads enabled");
            pipeline = pipeline.with_blob_store(Arc::new(blob_store));
        }
        None => info!("STORAGE_BUCKET not set; image uploads disabled"),
    }

    Ok(pipeline)
}

/// Build the full application state around `store`.
pub fn build_state(config: ApiConfig, store: Arc<dyn ChatStore>) -> Result<AppState, MediaError> {
    let client = Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .map_err(|e| MediaError::Config(format!("failed to build HTTP client: {e}")))?;

    let pipeline = build_pipeline(&config, client, store)?;

    let rate_limiter = if config.rate_limit_enabled {
        info!(
            max_requests = config.rate_limit.max_requests,
            window_secs = config.rate_limit.window.as_secs(),
            "rate limiting enabled"
        );
        Some(Arc::new(RateLimiter::new(config.rate_limit)))
    } else {
        info!("rate limiting disabled");
        None
    };

    Ok(AppState {
        pipeline,
        rate_limiter,
        config,
    })
}
