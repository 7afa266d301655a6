use axum::Router;

use crate::{
    dto::validation::validate_identifier,
    error::AppError,
    state::{SharedState, track::RoomId},
};

pub mod docs;
pub mod health;
pub mod player;
pub mod rooms;
pub mod sse;
pub mod votes;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(rooms::router())
        .merge(votes::router())
        .merge(player::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// Validate a room identifier taken from the request path.
pub(crate) fn room_id(raw: String) -> Result<RoomId, AppError> {
    validate_identifier(&raw)
        .map_err(|err| AppError::BadRequest(format!("invalid room identifier: {err}")))?;
    Ok(RoomId::from(raw))
}
