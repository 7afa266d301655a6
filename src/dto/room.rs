use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::validation::validate_identifier,
    state::{
        auth::Requester,
        scheduler::{RepeatSettings, SchedulerPhase},
        session::SessionSnapshot,
        track::{Track, UserId},
    },
};

/// Identity of the chat user issuing a command, as reported by the gateway.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RequesterInput {
    pub id: String,
    /// Role names held in the room.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Permission names held in the room.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Validate for RequesterInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_identifier(&self.id) {
            errors.add("id", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<RequesterInput> for Requester {
    fn from(value: RequesterInput) -> Self {
        Self {
            id: UserId::from(value.id),
            roles: value.roles,
            permissions: value.permissions,
        }
    }
}

/// Body of commands that only need the caller's identity.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CommandRequest {
    #[validate(nested)]
    pub requester: RequesterInput,
}

/// Track metadata resolved by the gateway.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct TrackInput {
    #[validate(length(min = 1, max = 2048))]
    pub uri: String,
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    #[validate(url)]
    pub thumbnail_url: Option<String>,
}

/// Request one or more tracks in a room, queued in the given order.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct EnqueueRequest {
    #[validate(nested)]
    pub requester: RequesterInput,
    #[validate(length(min = 1, max = 500), nested)]
    pub tracks: Vec<TrackInput>,
}

/// Number of listeners left in the room's voice channel, reported by the gateway.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListenersRequest {
    /// Listeners other than the bot itself.
    pub count: usize,
}

/// Set the repeat counter of the current track.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RepeatRequest {
    #[validate(nested)]
    pub requester: RequesterInput,
    /// Additional plays; `0` clears the counter.
    pub count: i64,
}

/// Change the room volume.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct VolumeRequest {
    #[validate(nested)]
    pub requester: RequesterInput,
    /// Volume between 0 and 150.
    pub volume: i64,
}

/// Jump ahead to a queue position.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PositionRequest {
    #[validate(nested)]
    pub requester: RequesterInput,
    /// 1-based queue position.
    pub position: usize,
}

/// Track as exposed by the API.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct TrackSummary {
    pub id: Uuid,
    pub uri: String,
    pub title: String,
    pub duration_ms: u64,
    pub thumbnail_url: Option<String>,
    pub requester: String,
}

impl From<Track> for TrackSummary {
    fn from(track: Track) -> Self {
        Self {
            id: track.id,
            uri: track.uri,
            title: track.title,
            duration_ms: track.duration_ms,
            thumbnail_url: track.thumbnail_url,
            requester: track.requester.0,
        }
    }
}

/// Repeat and loop settings of a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct RepeatSummary {
    /// Additional plays still scheduled for the current track.
    pub remaining: u32,
    pub track_loop: bool,
    pub playlist_loop: bool,
}

impl From<RepeatSettings> for RepeatSummary {
    fn from(value: RepeatSettings) -> Self {
        Self {
            remaining: value.remaining,
            track_loop: value.track_loop,
            playlist_loop: value.playlist_loop,
        }
    }
}

/// Read-only view of a room's playback.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSnapshotResponse {
    pub room: String,
    pub phase: SchedulerPhase,
    pub current: Option<TrackSummary>,
    pub paused: bool,
    pub queue: Vec<TrackSummary>,
    /// Sum of the pending tracks' durations.
    pub queue_duration_ms: u64,
    pub repeat: RepeatSummary,
    pub volume: u16,
    /// Last reported listener count.
    pub listeners: Option<usize>,
    /// Whether the session will leave the room once a countdown runs out.
    pub leaving_soon: bool,
}

impl From<SessionSnapshot> for SessionSnapshotResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        let queue_duration_ms = snapshot.queue.iter().map(|t| t.duration_ms).sum();
        Self {
            room: snapshot.room.0,
            phase: snapshot.phase,
            current: snapshot.current.map(TrackSummary::from),
            paused: snapshot.paused,
            queue: snapshot.queue.into_iter().map(TrackSummary::from).collect(),
            queue_duration_ms,
            repeat: snapshot.repeat.into(),
            volume: snapshot.volume,
            listeners: snapshot.listeners,
            leaving_soon: snapshot.leaving_soon,
        }
    }
}

/// Result of an enqueue request.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnqueueResponse {
    /// Requested tracks in queue order.
    pub tracks: Vec<TrackSummary>,
    /// Queue position of the first track still pending, absent when a single
    /// track started right away.
    pub position: Option<usize>,
}

/// Track affected by a command.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackResponse {
    pub track: TrackSummary,
}

/// New value of a toggled setting.
#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleResponse {
    pub enabled: bool,
}

/// Volume before and after a change.
#[derive(Debug, Serialize, ToSchema)]
pub struct VolumeResponse {
    pub previous: u16,
    pub current: u16,
}

/// Number of tracks affected by a command.
#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub count: usize,
}
