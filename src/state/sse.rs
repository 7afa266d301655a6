use std::sync::Arc;

use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    announcements: Arc<SseHub>,
    player: Arc<SseHub>,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(announcement_capacity: usize, player_capacity: usize) -> Self {
        Self {
            announcements: Arc::new(SseHub::new(announcement_capacity)),
            player: Arc::new(SseHub::new(player_capacity)),
        }
    }

    /// Hub carrying room announcements for the chat gateway.
    pub fn announcements(&self) -> &Arc<SseHub> {
        &self.announcements
    }

    /// Hub carrying playback commands for the audio node.
    pub fn player(&self) -> &Arc<SseHub> {
        &self.player
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}
