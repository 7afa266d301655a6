use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Jukebox Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::announcements_stream,
        crate::routes::sse::player_stream,
        crate::routes::rooms::get_session,
        crate::routes::rooms::stop_session,
        crate::routes::rooms::enqueue_track,
        crate::routes::rooms::pause,
        crate::routes::rooms::resume,
        crate::routes::rooms::skip,
        crate::routes::rooms::skip_to,
        crate::routes::rooms::remove_track,
        crate::routes::rooms::shuffle,
        crate::routes::rooms::set_repeat,
        crate::routes::rooms::toggle_track_loop,
        crate::routes::rooms::toggle_playlist_loop,
        crate::routes::rooms::set_volume,
        crate::routes::rooms::clear_queue,
        crate::routes::votes::propose_vote,
        crate::routes::votes::current_vote,
        crate::routes::votes::confirm_vote,
        crate::routes::votes::reject_vote,
        crate::routes::player::player_event,
        crate::routes::player::set_listeners,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::room::RequesterInput,
            crate::dto::room::CommandRequest,
            crate::dto::room::TrackInput,
            crate::dto::room::EnqueueRequest,
            crate::dto::room::RepeatRequest,
            crate::dto::room::VolumeRequest,
            crate::dto::room::PositionRequest,
            crate::dto::room::ListenersRequest,
            crate::dto::room::TrackSummary,
            crate::dto::room::RepeatSummary,
            crate::dto::room::SessionSnapshotResponse,
            crate::dto::room::EnqueueResponse,
            crate::dto::room::TrackResponse,
            crate::dto::room::ToggleResponse,
            crate::dto::room::VolumeResponse,
            crate::dto::room::CountResponse,
            crate::dto::vote::ProposeVoteRequest,
            crate::dto::vote::VoteSummary,
            crate::dto::vote::ConfirmVoteResponse,
            crate::dto::player::PlayerEventInput,
            crate::state::scheduler::SchedulerPhase,
            crate::state::player::TrackEndReason,
            crate::state::vote::VoteAction,
            crate::state::vote::VoteOutcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "rooms", description = "Playback commands issued from chat rooms"),
        (name = "votes", description = "Group votes on contested commands"),
        (name = "player", description = "Player events and listener counts reported by audio nodes"),
    )
)]
pub struct ApiDoc;
