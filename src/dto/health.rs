use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always "ok" while the process serves requests.
    pub status: String,
    /// Rooms holding a playback session.
    pub rooms: usize,
    /// Votes currently collecting confirmations.
    pub active_votes: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(rooms: usize, active_votes: usize) -> Self {
        Self {
            status: "ok".to_string(),
            rooms,
            active_votes,
        }
    }
}
