use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/announcements",
    tag = "sse",
    responses((status = 200, description = "Room announcements SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream room announcements to the chat gateway.
pub async fn announcements_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    info!("New announcements SSE connection");
    let receiver = sse_service::subscribe(&state, StreamKind::Announcements);
    sse_service::to_sse_stream(receiver, StreamKind::Announcements)
}

#[utoipa::path(
    get,
    path = "/sse/player",
    tag = "sse",
    responses((status = 200, description = "Player command SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream playback commands to the audio nodes.
pub async fn player_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    info!("New player SSE connection");
    let receiver = sse_service::subscribe(&state, StreamKind::Player);
    sse_service::to_sse_stream(receiver, StreamKind::Player)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/announcements", get(announcements_stream))
        .route("/sse/player", get(player_stream))
}
