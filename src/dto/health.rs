use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Rooms currently alive.
    pub rooms: usize,
    /// Open WebSocket connections.
    pub connections: usize,
}

impl HealthResponse {
    pub fn ok(rooms: usize, connections: usize) -> Self {
        Self {
            status: "ok".to_string(),
            rooms,
            connections,
        }
    }

    /// The question store is unreachable; rooms keep running but cannot load questions.
    pub fn degraded(rooms: usize, connections: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            rooms,
            connections,
        }
    }
}
