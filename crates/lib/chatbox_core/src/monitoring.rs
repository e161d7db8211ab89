//! Error monitoring.
//!
//! External-call failures are reported here in addition to being logged.
//! Monitoring is off unless a DSN is configured; [`NoopReporter`] stands in.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

/// Which collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Ai,
    Media,
    Store,
    Unknown,
}

/// A single reported failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub component: Component,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(component: Component, message: impl Into<String>) -> Self {
        Self {
            component,
            message: message.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Sink for failure events. Reporting never fails the caller.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, event: ErrorEvent);
}

/// Reporter used when monitoring is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report(&self, event: ErrorEvent) {
        debug!(component = ?event.component, "monitoring disabled, event dropped");
    }
}

/// Posts events as JSON to a monitoring endpoint.
///
/// Delivery runs on a spawned task. Failed
/// deliveries are logged and dropped.
#[derive(Debug, Clone)]
pub struct HttpErrorReporter {
    client: Client,
    endpoint: Url,
}

impl HttpErrorReporter {
    pub fn new(client: Client, dsn: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: Url::parse(dsn)?,
        })
    }
}

impl ErrorReporter for HttpErrorReporter {
    fn report(&self, event: ErrorEvent) {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            match client.post(endpoint).json(&event).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!(status = %resp.status(), "monitoring endpoint rejected event"),
                Err(e) => warn!(error = %e, "failed to deliver monitoring event"),
            }
        });
    }
}

/// Pick a reporter from an optional DSN.
///
/// An unparsable DSN disables monitoring with a warning rather than failing
/// startup.
pub fn reporter_from_dsn(client: Client, dsn: Option<&str>) -> Arc<dyn ErrorReporter> {
    match dsn.filter(|d| !d.trim().is_empty()) {
        Some(dsn) => match HttpErrorReporter::new(client, dsn.trim()) {
            Ok(reporter) => Arc::new(reporter),
            Err(e) => {
                warn!(error = %e, "invalid MONITORING_DSN, error monitoring disabled");
                Arc::new(NoopReporter)
            }
        },
        None => Arc::new(NoopReporter),
    }
}
