use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::player::{PlayerEvent, TrackEndReason};

/// Lifecycle event posted by the audio node.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEventInput {
    Started {
        track_id: Uuid,
    },
    Paused,
    Resumed,
    Ended {
        track_id: Uuid,
        reason: TrackEndReason,
    },
    Errored {
        track_id: Uuid,
        message: String,
    },
    /// The track stopped producing audio.
    Stuck {
        track_id: Uuid,
    },
}

impl From<PlayerEventInput> for PlayerEvent {
    fn from(value: PlayerEventInput) -> Self {
        match value {
            PlayerEventInput::Started { track_id } => PlayerEvent::Started { track_id },
            PlayerEventInput::Paused => PlayerEvent::Paused,
            PlayerEventInput::Resumed => PlayerEvent::Resumed,
            PlayerEventInput::Ended { track_id, reason } => PlayerEvent::Ended { track_id, reason },
            PlayerEventInput::Errored { track_id, message } => {
                PlayerEvent::Errored { track_id, message }
            }
            PlayerEventInput::Stuck { track_id } => PlayerEvent::Errored {
                track_id,
                message: "track stuck".into(),
            },
        }
    }
}
