use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Identifier of a room (one per guild) owning its own queue and session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Deref for RoomId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a chat user issuing commands or requesting tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Deref for UserId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A playable track requested by a room member.
///
/// Tracks are immutable values. `id` identifies one play of the track so two
/// entries with the same `uri` (e.g. a playlist loop re-enqueue) stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    /// Instance identifier for this play of the track.
    pub id: Uuid,
    /// Source identifier or URL understood by the audio node.
    pub uri: String,
    /// Human readable title.
    pub title: String,
    /// Track length in milliseconds (0 for streams).
    pub duration_ms: u64,
    /// Optional artwork reference.
    pub thumbnail_url: Option<String>,
    /// Member who requested the track; owner for permission checks.
    pub requester: UserId,
}

impl Track {
    /// Build a new track with a fresh instance identifier.
    pub fn new(
        uri: impl Into<String>,
        title: impl Into<String>,
        duration_ms: u64,
        thumbnail_url: Option<String>,
        requester: UserId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            uri: uri.into(),
            title: title.into(),
            duration_ms,
            thumbnail_url,
            requester,
        }
    }

    /// Fresh play of the same track, carrying identical metadata under a new instance id.
    pub fn replay(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }

    /// Attributes referenced by announcements about this track.
    pub fn attributes(&self) -> Value {
        json!({
            "track_id": self.id,
            "title": self.title,
            "uri": self.uri,
            "duration_ms": self.duration_ms,
            "thumbnail_url": self.thumbnail_url,
            "requester": self.requester,
        })
    }
}
