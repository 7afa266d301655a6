use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use validator::Validate;

use crate::{
    dto::room::{
        CommandRequest, CountResponse, EnqueueRequest, EnqueueResponse, PositionRequest,
        RepeatRequest, SessionSnapshotResponse, ToggleResponse, TrackResponse, VolumeRequest,
        VolumeResponse,
    },
    error::AppError,
    routes::room_id,
    services::room_service,
    state::SharedState,
};

/// Playback commands issued by chat members for a room.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room}", get(get_session).delete(stop_session))
        .route("/rooms/{room}/tracks", post(enqueue_track))
        .route("/rooms/{room}/pause", post(pause))
        .route("/rooms/{room}/resume", post(resume))
        .route("/rooms/{room}/skip", post(skip))
        .route("/rooms/{room}/skip-to", post(skip_to))
        .route("/rooms/{room}/shuffle", post(shuffle))
        .route("/rooms/{room}/repeat", post(set_repeat))
        .route("/rooms/{room}/loop/track", post(toggle_track_loop))
        .route("/rooms/{room}/loop/playlist", post(toggle_playlist_loop))
        .route("/rooms/{room}/volume", post(set_volume))
        .route("/rooms/{room}/clear", post(clear_queue))
        .route("/rooms/{room}/queue/{position}", delete(remove_track))
}

/// Retrieve the playback state of a room.
#[utoipa::path(
    get,
    path = "/rooms/{room}",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Current playback state", body = SessionSnapshotResponse),
        (status = 404, description = "No session for this room")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(room): Path<String>,
) -> Result<Json<SessionSnapshotResponse>, AppError> {
    let room = room_id(room)?;
    Ok(Json(room_service::snapshot(&state, &room).await?))
}

/// Stop playback and leave the room.
#[utoipa::path(
    delete,
    path = "/rooms/{room}",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 204, description = "Session stopped"),
        (status = 403, description = "Requester may not stop playback"),
        (status = 404, description = "No session for this room")
    )
)]
pub async fn stop_session(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<StatusCode, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    room_service::stop(&state, &room, payload.requester).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request a track; it starts right away when nothing is playing.
#[utoipa::path(
    post,
    path = "/rooms/{room}/tracks",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = EnqueueRequest,
    responses(
        (status = 201, description = "Track queued or started", body = EnqueueResponse),
        (status = 400, description = "Invalid track")
    )
)]
pub async fn enqueue_track(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    let response = room_service::enqueue(&state, &room, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Pause the current track.
#[utoipa::path(
    post,
    path = "/rooms/{room}/pause",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Paused track", body = TrackResponse),
        (status = 403, description = "Requester may not control this track"),
        (status = 409, description = "Nothing playing or already paused")
    )
)]
pub async fn pause(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<TrackResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(room_service::pause(&state, &room, payload.requester).await?))
}

/// Resume the paused track.
#[utoipa::path(
    post,
    path = "/rooms/{room}/resume",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Resumed track", body = TrackResponse),
        (status = 403, description = "Requester may not control this track"),
        (status = 409, description = "Nothing playing or not paused")
    )
)]
pub async fn resume(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<TrackResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(room_service::resume(&state, &room, payload.requester).await?))
}

/// Skip the current track.
#[utoipa::path(
    post,
    path = "/rooms/{room}/skip",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Skipped track", body = TrackResponse),
        (status = 403, description = "Requester may not control this track"),
        (status = 409, description = "Nothing playing")
    )
)]
pub async fn skip(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<TrackResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(room_service::skip(&state, &room, payload.requester).await?))
}

/// Drop the tracks ahead of a queue position and play it.
#[utoipa::path(
    post,
    path = "/rooms/{room}/skip-to",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = PositionRequest,
    responses(
        (status = 200, description = "Track now playing", body = TrackResponse),
        (status = 400, description = "Position out of range"),
        (status = 403, description = "Requester may not control this track")
    )
)]
pub async fn skip_to(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<PositionRequest>,
) -> Result<Json<TrackResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(
        room_service::skip_to(&state, &room, payload.requester, payload.position).await?,
    ))
}

/// Remove a pending track from the queue.
#[utoipa::path(
    delete,
    path = "/rooms/{room}/queue/{position}",
    tag = "rooms",
    params(
        ("room" = String, Path, description = "Room identifier"),
        ("position" = usize, Path, description = "1-based queue position")
    ),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Removed track", body = TrackResponse),
        (status = 400, description = "Position out of range"),
        (status = 403, description = "Requester may not remove this track")
    )
)]
pub async fn remove_track(
    State(state): State<SharedState>,
    Path((room, position)): Path<(String, usize)>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<TrackResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(
        room_service::remove_at(&state, &room, payload.requester, position).await?,
    ))
}

/// Shuffle the pending tracks.
#[utoipa::path(
    post,
    path = "/rooms/{room}/shuffle",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Number of shuffled tracks", body = CountResponse),
        (status = 409, description = "Queue is empty")
    )
)]
pub async fn shuffle(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<CountResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(room_service::shuffle(&state, &room).await?))
}

/// Schedule extra plays of the current track.
#[utoipa::path(
    post,
    path = "/rooms/{room}/repeat",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = RepeatRequest,
    responses(
        (status = 200, description = "Repeated track", body = TrackResponse),
        (status = 400, description = "Count out of range"),
        (status = 403, description = "Requester may not control this track")
    )
)]
pub async fn set_repeat(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<RepeatRequest>,
) -> Result<Json<TrackResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(
        room_service::set_repeat(&state, &room, payload.requester, payload.count).await?,
    ))
}

/// Toggle endless replay of the current track.
#[utoipa::path(
    post,
    path = "/rooms/{room}/loop/track",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "New loop state", body = ToggleResponse),
        (status = 403, description = "Requester may not control this track")
    )
)]
pub async fn toggle_track_loop(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(
        room_service::toggle_track_loop(&state, &room, payload.requester).await?,
    ))
}

/// Toggle re-queueing of finished tracks.
#[utoipa::path(
    post,
    path = "/rooms/{room}/loop/playlist",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "New loop state", body = ToggleResponse),
        (status = 403, description = "Requester may not control this track")
    )
)]
pub async fn toggle_playlist_loop(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(
        room_service::toggle_playlist_loop(&state, &room, payload.requester).await?,
    ))
}

/// Change the playback volume.
#[utoipa::path(
    post,
    path = "/rooms/{room}/volume",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = VolumeRequest,
    responses(
        (status = 200, description = "Previous and new volume", body = VolumeResponse),
        (status = 400, description = "Volume out of range"),
        (status = 403, description = "Requester may not control this track")
    )
)]
pub async fn set_volume(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<VolumeRequest>,
) -> Result<Json<VolumeResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(
        room_service::set_volume(&state, &room, payload.requester, payload.volume).await?,
    ))
}

/// Drop every pending track.
#[utoipa::path(
    post,
    path = "/rooms/{room}/clear",
    tag = "rooms",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Number of removed tracks", body = CountResponse),
        (status = 403, description = "Requester may not clear the queue"),
        (status = 409, description = "Queue is empty")
    )
)]
pub async fn clear_queue(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<CountResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(
        room_service::clear_queue(&state, &room, payload.requester).await?,
    ))
}
