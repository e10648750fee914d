//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while running, `"shutting_down"` once shutdown began.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Conversations held in memory.
    pub conversations: usize,
    /// Open conversation stream subscriptions.
    pub subscribers: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    conversations: usize,
    subscribers: usize,
    shutting_down: bool,
) -> HealthResponse {
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        conversations,
        subscribers,
    }
}
