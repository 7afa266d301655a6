//! Boundary to the audio node: player handles, their lifecycle events and the SSE backed adapter.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::sse::ServerEvent,
    state::{
        SseHub,
        track::{RoomId, Track},
    },
};

const EVENT_PLAYER_COMMAND: &str = "player.command";

/// Why a track stopped playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackEndReason {
    /// Track reached its end.
    Finished,
    /// Track could not be loaded.
    LoadFailed,
    /// Player was stopped explicitly.
    Stopped,
    /// Another track was started in its place.
    Replaced,
    /// Player was torn down.
    Cleanup,
}

impl TrackEndReason {
    /// Whether the scheduler may advance to the next track after this reason.
    pub fn may_start_next(self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}

/// Lifecycle notification emitted by the audio node for a room's player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The referenced track started playing.
    Started { track_id: Uuid },
    /// Playback was paused.
    Paused,
    /// Playback was resumed.
    Resumed,
    /// The referenced track stopped.
    Ended { track_id: Uuid, reason: TrackEndReason },
    /// The referenced track failed while playing.
    Errored { track_id: Uuid, message: String },
}

/// Handle to the audio player bound to one room.
///
/// Calls are fire-and-forget; outcomes come back as [`PlayerEvent`]s.
pub trait PlayerHandle: Send + Sync {
    /// Replace whatever is playing with `track`.
    fn load_and_start(&self, track: &Track);
    /// Pause playback.
    fn pause(&self);
    /// Resume playback.
    fn resume(&self);
    /// Change the output volume.
    fn set_volume(&self, volume: u16);
    /// Stop the current track without loading another one.
    fn stop(&self);
    /// Track the player believes it is playing.
    fn current_track(&self) -> Option<Track>;
    /// Disconnect and free the player.
    fn release(&self);
}

/// Creates player handles for rooms.
pub trait PlayerFactory: Send + Sync {
    /// Bind a new player to `room`.
    fn create(&self, room: &RoomId) -> Arc<dyn PlayerHandle>;
}

/// Command published to the audio node on the player stream.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Load and start a track.
    Load {
        room: String,
        track_id: Uuid,
        uri: String,
        title: String,
    },
    /// Pause playback.
    Pause { room: String },
    /// Resume playback.
    Resume { room: String },
    /// Change the volume.
    Volume { room: String, volume: u16 },
    /// Stop the current track.
    Stop { room: String },
    /// Leave the room and free resources.
    Release { room: String },
}

#[derive(Debug, Clone, Default)]
struct PlayerMirror {
    track: Option<Track>,
    paused: bool,
    volume: u16,
    released: bool,
}

/// Player handle driving a remote audio node through the player SSE stream.
pub struct RemotePlayer {
    room: RoomId,
    hub: Arc<SseHub>,
    mirror: watch::Sender<PlayerMirror>,
}

impl RemotePlayer {
    /// Create a player for `room` publishing on `hub`.
    pub fn new(room: RoomId, hub: Arc<SseHub>) -> Self {
        let (mirror, _rx) = watch::channel(PlayerMirror::default());
        Self { room, hub, mirror }
    }

    fn publish(&self, command: PlayerCommand) {
        if self.mirror.borrow().released {
            debug!(room = %self.room, ?command, "dropping command for released player");
            return;
        }
        match ServerEvent::json(Some(EVENT_PLAYER_COMMAND.to_string()), &command) {
            Ok(event) => self.hub.broadcast(event),
            Err(err) => warn!(room = %self.room, error = %err, "failed to encode player command"),
        }
    }
}

impl PlayerHandle for RemotePlayer {
    fn load_and_start(&self, track: &Track) {
        self.publish(PlayerCommand::Load {
            room: self.room.to_string(),
            track_id: track.id,
            uri: track.uri.clone(),
            title: track.title.clone(),
        });
        self.mirror.send_modify(|mirror| mirror.track = Some(track.clone()));
    }

    fn pause(&self) {
        self.publish(PlayerCommand::Pause {
            room: self.room.to_string(),
        });
        self.mirror.send_modify(|mirror| mirror.paused = true);
    }

    fn resume(&self) {
        self.publish(PlayerCommand::Resume {
            room: self.room.to_string(),
        });
        self.mirror.send_modify(|mirror| mirror.paused = false);
    }

    fn set_volume(&self, volume: u16) {
        self.publish(PlayerCommand::Volume {
            room: self.room.to_string(),
            volume,
        });
        self.mirror.send_modify(|mirror| mirror.volume = volume);
    }

    fn stop(&self) {
        self.publish(PlayerCommand::Stop {
            room: self.room.to_string(),
        });
        self.mirror.send_modify(|mirror| mirror.track = None);
    }

    fn current_track(&self) -> Option<Track> {
        self.mirror.borrow().track.clone()
    }

    fn release(&self) {
        self.publish(PlayerCommand::Release {
            room: self.room.to_string(),
        });
        self.mirror.send_modify(|mirror| {
            mirror.track = None;
            mirror.released = true;
        });
    }
}

/// Factory producing [`RemotePlayer`]s that share the player SSE hub.
pub struct RemotePlayerFactory {
    hub: Arc<SseHub>,
}

impl RemotePlayerFactory {
    /// Build a factory publishing on `hub`.
    pub fn new(hub: Arc<SseHub>) -> Self {
        Self { hub }
    }
}

impl PlayerFactory for RemotePlayerFactory {
    fn create(&self, room: &RoomId) -> Arc<dyn PlayerHandle> {
        Arc::new(RemotePlayer::new(room.clone(), self.hub.clone()))
    }
}
