use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    dto::sse::ServerEvent,
    state::{SseHub, track::RoomId},
};

/// A track began playing.
pub const TRACK_STARTED: &str = "track.started";
/// A track began while the player is paused.
pub const TRACK_STARTED_PAUSED: &str = "track.started_paused";
/// The current track starts another scheduled repeat.
pub const TRACK_REPEATING: &str = "track.repeating";
/// The player failed to play a track.
pub const TRACK_ERROR: &str = "track.error";
/// The last pending track finished.
pub const QUEUE_ENDED: &str = "queue.ended";
/// The session left after staying idle too long.
pub const SESSION_LEFT_IDLE: &str = "session.left_idle";
/// The session left because nobody remained in the voice channel.
pub const SESSION_LEFT_EMPTY: &str = "session.left_empty";
/// A group vote was proposed.
pub const VOTE_STARTED: &str = "vote.started";
/// A member confirmed or rejected a running vote.
pub const VOTE_PROGRESS: &str = "vote.progress";
/// A vote passed and its action succeeded.
pub const VOTE_APPLIED: &str = "vote.applied";
/// A vote was rejected.
pub const VOTE_REJECTED: &str = "vote.rejected";
/// A vote ran out of time.
pub const VOTE_TIMED_OUT: &str = "vote.timed_out";
/// A vote passed but its action failed.
pub const VOTE_FAILED: &str = "vote.failed";

/// Renders user-facing messages for a room; fire-and-forget.
pub trait NotificationSink: Send + Sync {
    /// Deliver the message identified by `key` with its template attributes.
    fn announce(&self, room: &RoomId, key: &str, attributes: Value);
}

#[derive(Serialize)]
struct Announcement<'a> {
    room: &'a RoomId,
    attributes: Value,
}

/// Sink forwarding announcements to the chat gateway over SSE.
pub struct SseNotificationSink {
    hub: Arc<SseHub>,
}

impl SseNotificationSink {
    /// Sink publishing on `hub`.
    pub fn new(hub: Arc<SseHub>) -> Self {
        Self { hub }
    }
}

impl NotificationSink for SseNotificationSink {
    fn announce(&self, room: &RoomId, key: &str, attributes: Value) {
        match ServerEvent::json(Some(key.to_string()), &Announcement { room, attributes }) {
            Ok(event) => self.hub.broadcast(event),
            Err(err) => warn!(room = %room, key, error = %err, "failed to encode announcement"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn announcements_are_published_with_their_key() {
        let hub = Arc::new(SseHub::new(4));
        let mut receiver = hub.subscribe();
        let sink = SseNotificationSink::new(hub);

        sink.announce(&RoomId::from("guild-1"), QUEUE_ENDED, json!({}));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(QUEUE_ENDED));
        let payload: Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(payload["room"], "guild-1");
    }
}
