use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Rooms that currently have at least one change feed subscriber.
    pub active_feeds: usize,
}

impl HealthResponse {
    /// Storage reachable.
    pub fn ok(active_feeds: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_feeds,
        }
    }

    /// Running without a usable storage backend.
    pub fn degraded(active_feeds: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            active_feeds,
        }
    }
}
