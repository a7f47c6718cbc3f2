use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: &'static str,
    /// Number of games currently streamed to at least one client.
    pub live_games: usize,
}

impl HealthResponse {
    /// Storage reachable.
    pub fn ok(live_games: usize) -> Self {
        Self {
            status: "ok",
            live_games,
        }
    }

    /// Running without a usable storage backend.
    pub fn degraded(live_games: usize) -> Self {
        Self {
            status: "degraded",
            live_games,
        }
    }
}
