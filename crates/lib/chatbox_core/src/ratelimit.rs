//! Per-client fixed-window rate limiting.
//!
//! Counters live in process memory only: they are not shared across instances
//! and vanish on restart. Each client's window opens at its first request and
//! resets once the window length has elapsed.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default number of requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: u64 = 10;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Limiter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

/// State of an allowed request's window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Seconds until the window resets.
    pub reset_after: u64,
}

/// Returned when a client has used up its window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub limit: u64,
    /// Seconds until the caller can retry (at least 1).
    pub retry_after: u64,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u64,
}

/// In-memory fixed-window limiter keyed by client identifier.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, Window>,
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a request from `client_id` and decide whether it may proceed.
    pub fn check(&self, client_id: &str) -> Result<RateLimitStatus, RateLimitExceeded> {
        self.check_at(client_id, Instant::now())
    }

    fn check_at(
        &self,
        client_id: &str,
        now: Instant,
    ) -> Result<RateLimitStatus, RateLimitExceeded> {
        let limit = self.config.max_requests;
        // The entry guard holds the shard lock: read, compare and increment
        // happen as one step for this client.
        let mut window = self
            .windows
            .entry(client_id.to_string())
            .or_insert(Window {
                started: now,
                count: 0,
            });

        let mut elapsed = now.saturating_duration_since(window.started);
        if elapsed >= self.config.window {
            window.started = now;
            window.count = 0;
            elapsed = Duration::ZERO;
        }
        let reset_after = ceil_secs(self.config.window - elapsed);

        if window.count >= limit {
            return Err(RateLimitExceeded {
                limit,
                retry_after: reset_after.max(1),
            });
        }

        window.count += 1;
        Ok(RateLimitStatus {
            limit,
            remaining: limit - window.count,
            reset_after,
        })
    }

    /// Drop windows that have fully elapsed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.config.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}
