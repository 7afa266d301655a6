//! Service helpers translating room commands into session registry calls.

use crate::{
    dto::{
        player::PlayerEventInput,
        room::{
            CountResponse, EnqueueRequest, EnqueueResponse, ListenersRequest, RequesterInput,
            SessionSnapshotResponse, ToggleResponse, TrackResponse, TrackSummary, VolumeResponse,
        },
    },
    error::ServiceError,
    state::{
        SharedState,
        auth::{Authority, Requester},
        track::{RoomId, Track, UserId},
    },
};

/// Resolve the gateway identity into the authority a command runs with.
pub fn member_authority(state: &SharedState, room: &RoomId, requester: RequesterInput) -> Authority {
    let requester = Requester::from(requester);
    Authority::Member(state.roles().resolve(room, &requester))
}

/// Current state of the room's session.
pub async fn snapshot(
    state: &SharedState,
    room: &RoomId,
) -> Result<SessionSnapshotResponse, ServiceError> {
    let snapshot = state.sessions().snapshot(room).await?;
    Ok(snapshot.into())
}

/// Queue the requested tracks in order, creating the room's session when needed.
pub async fn enqueue(
    state: &SharedState,
    room: &RoomId,
    request: EnqueueRequest,
) -> Result<EnqueueResponse, ServiceError> {
    let EnqueueRequest { requester, tracks } = request;
    let requester = UserId::from(requester.id);
    let tracks: Vec<Track> = tracks
        .into_iter()
        .map(|input| {
            Track::new(
                input.uri,
                input.title,
                input.duration_ms,
                input.thumbnail_url,
                requester.clone(),
            )
        })
        .collect();
    let summaries = tracks.iter().cloned().map(TrackSummary::from).collect();
    let position = state.sessions().enqueue_many(room, tracks).await?;
    Ok(EnqueueResponse {
        tracks: summaries,
        position,
    })
}

/// Pause the current track on behalf of `requester`.
pub async fn pause(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
) -> Result<TrackResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let track = state.sessions().pause(room, &authority).await?;
    Ok(track_response(track))
}

/// Resume the paused track on behalf of `requester`.
pub async fn resume(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
) -> Result<TrackResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let track = state.sessions().resume(room, &authority).await?;
    Ok(track_response(track))
}

/// Skip the current track; the response carries the skipped track.
pub async fn skip(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
) -> Result<TrackResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let track = state.sessions().skip(room, &authority).await?;
    Ok(track_response(track))
}

/// Jump to a queue position; the response carries the track now playing.
pub async fn skip_to(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
    position: usize,
) -> Result<TrackResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let track = state.sessions().skip_to(room, &authority, position).await?;
    Ok(track_response(track))
}

/// Remove the pending track at `position`.
pub async fn remove_at(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
    position: usize,
) -> Result<TrackResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let track = state.sessions().remove_at(room, &authority, position).await?;
    Ok(track_response(track))
}

/// Shuffle the pending tracks.
pub async fn shuffle(state: &SharedState, room: &RoomId) -> Result<CountResponse, ServiceError> {
    let count = state.sessions().shuffle(room).await?;
    Ok(CountResponse { count })
}

/// Set the repeat counter; the response carries the repeated track.
pub async fn set_repeat(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
    count: i64,
) -> Result<TrackResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let track = state.sessions().set_repeat(room, &authority, count).await?;
    Ok(track_response(track))
}

/// Flip the infinite loop of the current track.
pub async fn toggle_track_loop(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
) -> Result<ToggleResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let enabled = state.sessions().toggle_track_loop(room, &authority).await?;
    Ok(ToggleResponse { enabled })
}

/// Flip the infinite loop of the whole queue.
pub async fn toggle_playlist_loop(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
) -> Result<ToggleResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let enabled = state
        .sessions()
        .toggle_playlist_loop(room, &authority)
        .await?;
    Ok(ToggleResponse { enabled })
}

/// Change the output volume.
pub async fn set_volume(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
    volume: i64,
) -> Result<VolumeResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let previous = state.sessions().set_volume(room, &authority, volume).await?;
    let current = u16::try_from(volume).map_err(|_| {
        ServiceError::InvalidInput(format!("volume {volume} does not fit the player range"))
    })?;
    Ok(VolumeResponse { previous, current })
}

/// Drop every pending track.
pub async fn clear_queue(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
) -> Result<CountResponse, ServiceError> {
    let authority = member_authority(state, room, requester);
    let count = state.sessions().clear_queue(room, &authority).await?;
    Ok(CountResponse { count })
}

/// Tear the room's session down and release its player.
pub async fn stop(
    state: &SharedState,
    room: &RoomId,
    requester: RequesterInput,
) -> Result<(), ServiceError> {
    let authority = member_authority(state, room, requester);
    state.sessions().stop(room, &authority).await
}

/// Record the listener count of the room's voice channel.
pub async fn set_listeners(
    state: &SharedState,
    room: &RoomId,
    request: ListenersRequest,
) -> Result<(), ServiceError> {
    state.sessions().set_listener_count(room, request.count).await
}

/// Feed a lifecycle event reported by the room's audio node.
pub async fn player_event(
    state: &SharedState,
    room: &RoomId,
    event: PlayerEventInput,
) -> Result<(), ServiceError> {
    state.sessions().handle_player_event(room, event.into()).await
}

fn track_response(track: Track) -> TrackResponse {
    TrackResponse {
        track: track.into(),
    }
}
