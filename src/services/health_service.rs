use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness together with the number of rooms and running votes.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let rooms = state.sessions().len();
    let votes = state.votes().active_count();
    debug!(rooms, votes, "health check");
    HealthResponse::ok(rooms, votes)
}
