use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::{SharedState, SseHub},
};

/// Identifies the target SSE stream so disconnections are logged per stream.
#[derive(Clone, Copy, Debug)]
pub enum StreamKind {
    /// Room announcements rendered by the chat gateway.
    Announcements,
    /// Commands addressed to the audio nodes.
    Player,
}

impl StreamKind {
    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Announcements => "announcements",
            StreamKind::Player => "player",
        }
    }

    fn hub(self, state: &SharedState) -> &SseHub {
        match self {
            StreamKind::Announcements => state.announcements_sse(),
            StreamKind::Player => state.player_sse(),
        }
    }
}

/// Subscribe to the given stream and greet the new subscriber.
pub fn subscribe(state: &SharedState, kind: StreamKind) -> broadcast::Receiver<ServerEvent> {
    let hub = kind.hub(state);
    let receiver = hub.subscribe();
    broadcast_handshake(hub, kind, state.sessions().len());
    receiver
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// logging once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(stream = kind.name(), skipped, "SSE subscriber lagging");
                            continue;
                        }
                    }
                }
            }
        }

        tracing::info!(stream = kind.name(), "SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Broadcast a connection notice onto the stream.
fn broadcast_handshake(hub: &SseHub, kind: StreamKind, rooms: usize) {
    if let Ok(event) = ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            stream: kind.name().to_string(),
            message: format!("{} stream connected", kind.name()),
            rooms,
        },
    ) {
        hub.broadcast(event);
    }
}
