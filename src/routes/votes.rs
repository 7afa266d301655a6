use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use validator::Validate;

use crate::{
    dto::{
        room::CommandRequest,
        vote::{ConfirmVoteResponse, ProposeVoteRequest, VoteSummary},
    },
    error::AppError,
    routes::room_id,
    services::vote_service,
    state::SharedState,
};

/// Vote endpoints; one vote runs per room at a time.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room}/votes", post(propose_vote).get(current_vote))
        .route("/rooms/{room}/votes/confirm", post(confirm_vote))
        .route("/rooms/{room}/votes/reject", post(reject_vote))
}

/// Open a vote on a contested command.
#[utoipa::path(
    post,
    path = "/rooms/{room}/votes",
    tag = "votes",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = ProposeVoteRequest,
    responses(
        (status = 201, description = "Vote opened", body = VoteSummary),
        (status = 403, description = "Voting disabled in this room"),
        (status = 409, description = "Another vote is running or the action does not apply")
    )
)]
pub async fn propose_vote(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<ProposeVoteRequest>,
) -> Result<(StatusCode, Json<VoteSummary>), AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    let vote = vote_service::propose(&state, &room, payload).await?;
    Ok((StatusCode::CREATED, Json(vote)))
}

/// Retrieve the vote running in the room.
#[utoipa::path(
    get,
    path = "/rooms/{room}/votes",
    tag = "votes",
    params(("room" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Running vote", body = VoteSummary),
        (status = 409, description = "No vote running")
    )
)]
pub async fn current_vote(
    State(state): State<SharedState>,
    Path(room): Path<String>,
) -> Result<Json<VoteSummary>, AppError> {
    let room = room_id(room)?;
    Ok(Json(vote_service::current(&state, &room).await?))
}

/// Confirm the running vote.
#[utoipa::path(
    post,
    path = "/rooms/{room}/votes/confirm",
    tag = "votes",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Vote state after the confirmation", body = ConfirmVoteResponse),
        (status = 409, description = "No vote running or already voted")
    )
)]
pub async fn confirm_vote(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<ConfirmVoteResponse>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(
        vote_service::confirm(&state, &room, payload.requester).await?,
    ))
}

/// Reject the running vote.
#[utoipa::path(
    post,
    path = "/rooms/{room}/votes/reject",
    tag = "votes",
    params(("room" = String, Path, description = "Room identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Vote state after the rejection", body = VoteSummary),
        (status = 409, description = "No vote running or already voted")
    )
)]
pub async fn reject_vote(
    State(state): State<SharedState>,
    Path(room): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<VoteSummary>, AppError> {
    let room = room_id(room)?;
    payload.validate()?;
    Ok(Json(
        vote_service::reject(&state, &room, payload.requester).await?,
    ))
}
