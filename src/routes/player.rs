use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};

use crate::{
    dto::{player::PlayerEventInput, room::ListenersRequest},
    error::AppError,
    routes::room_id,
    services::room_service,
    state::SharedState,
};

/// Endpoints used by audio nodes and the gateway to report what happens in the voice channel.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room}/player/events", post(player_event))
        .route("/rooms/{room}/listeners", post(set_listeners))
}

/// Report a track lifecycle event for the room.
#[utoipa::path(
    post,
    path = "/rooms/{room}/player/events",
    tag = "player",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = PlayerEventInput,
    responses(
        (status = 202, description = "Event accepted"),
        (status = 404, description = "No session for this room")
    )
)]
pub async fn player_event(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<PlayerEventInput>,
) -> Result<StatusCode, AppError> {
    room_service::player_event(&state, &room_id(room)?, payload).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Report how many listeners remain in the room's voice channel.
#[utoipa::path(
    post,
    path = "/rooms/{room}/listeners",
    tag = "player",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = ListenersRequest,
    responses(
        (status = 204, description = "Listener count recorded"),
        (status = 404, description = "No session for this room")
    )
)]
pub async fn set_listeners(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<ListenersRequest>,
) -> Result<StatusCode, AppError> {
    room_service::set_listeners(&state, &room_id(room)?, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}
