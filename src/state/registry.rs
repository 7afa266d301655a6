use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    error::ServiceError,
    state::{
        auth::Authority,
        notify::{NotificationSink, SESSION_LEFT_EMPTY, SESSION_LEFT_IDLE},
        player::{PlayerEvent, PlayerFactory},
        scheduler::Effect,
        session::{PlaybackSession, SessionSnapshot},
        track::{RoomId, Track},
    },
};

/// Session of one room behind its own mutex.
pub type SharedSession = Arc<Mutex<PlaybackSession>>;

/// Owns the playback session of every room and exposes the command surface.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    rooms: DashMap<RoomId, SharedSession>,
    players: Arc<dyn PlayerFactory>,
    sink: Arc<dyn NotificationSink>,
    config: Arc<AppConfig>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new(
        config: Arc<AppConfig>,
        players: Arc<dyn PlayerFactory>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                rooms: DashMap::new(),
                players,
                sink,
                config,
            }),
        }
    }

    /// Return the room's session, creating it and binding a player when absent.
    pub fn get_or_create(&self, room: &RoomId) -> SharedSession {
        self.inner
            .rooms
            .entry(room.clone())
            .or_insert_with(|| {
                let volume = self.inner.config.room(room).default_volume;
                let player = self.inner.players.create(room);
                player.set_volume(volume);
                info!(room = %room, volume, "playback session created");
                Arc::new(Mutex::new(PlaybackSession::new(room.clone(), player, volume)))
            })
            .clone()
    }

    /// Return the room's session if one exists.
    pub fn get(&self, room: &RoomId) -> Result<SharedSession, ServiceError> {
        self.inner
            .rooms
            .get(room)
            .map(|entry| entry.value().clone())
            .ok_or(ServiceError::SessionNotFound)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.rooms.len()
    }

    /// Whether no room holds a session.
    pub fn is_empty(&self) -> bool {
        self.inner.rooms.is_empty()
    }

    /// Queue a track; it starts immediately when nothing plays.
    ///
    /// Returns the queue position, or `None` when the track started.
    pub async fn enqueue(&self, room: &RoomId, track: Track) -> Result<Option<usize>, ServiceError> {
        let title = track.title.clone();
        let requester = track.requester.clone();
        let position = self.run(room, |session| Ok(session.enqueue(track))).await?;
        info!(room = %room, %requester, %title, ?position, "track enqueued");
        Ok(position)
    }

    /// Queue a batch of tracks in order; the first starts when nothing plays.
    ///
    /// Returns the position of the first track still pending.
    pub async fn enqueue_many(
        &self,
        room: &RoomId,
        tracks: Vec<Track>,
    ) -> Result<Option<usize>, ServiceError> {
        let count = tracks.len();
        let position = self
            .run(room, |session| Ok(session.enqueue_many(tracks)))
            .await?;
        info!(room = %room, count, ?position, "tracks enqueued");
        Ok(position)
    }

    /// Pause the current track, returning it.
    pub async fn pause(&self, room: &RoomId, authority: &Authority) -> Result<Track, ServiceError> {
        let track = self
            .run(room, |session| Ok((session.pause(authority)?, Vec::new())))
            .await?;
        info!(room = %room, invoker = %authority, title = %track.title, "playback paused");
        Ok(track)
    }

    /// Resume the paused track, returning it.
    pub async fn resume(&self, room: &RoomId, authority: &Authority) -> Result<Track, ServiceError> {
        let track = self
            .run(room, |session| Ok((session.resume(authority)?, Vec::new())))
            .await?;
        info!(room = %room, invoker = %authority, title = %track.title, "playback resumed");
        Ok(track)
    }

    /// Skip the current track, returning it.
    pub async fn skip(&self, room: &RoomId, authority: &Authority) -> Result<Track, ServiceError> {
        let track = self.run(room, |session| session.skip(authority)).await?;
        info!(room = %room, invoker = %authority, title = %track.title, "track skipped");
        Ok(track)
    }

    /// Jump to the queue entry at `position`, returning the track now playing.
    pub async fn skip_to(
        &self,
        room: &RoomId,
        authority: &Authority,
        position: usize,
    ) -> Result<Track, ServiceError> {
        let track = self
            .run(room, |session| session.skip_to(authority, position))
            .await?;
        info!(room = %room, invoker = %authority, position, title = %track.title, "skipped ahead in queue");
        Ok(track)
    }

    /// Remove the pending track at `position`, returning it.
    pub async fn remove_at(
        &self,
        room: &RoomId,
        authority: &Authority,
        position: usize,
    ) -> Result<Track, ServiceError> {
        let track = self
            .run(room, |session| Ok((session.remove_at(authority, position)?, Vec::new())))
            .await?;
        info!(room = %room, invoker = %authority, position, title = %track.title, "track removed from queue");
        Ok(track)
    }

    /// Shuffle the queue, returning how many tracks were reordered.
    pub async fn shuffle(&self, room: &RoomId) -> Result<usize, ServiceError> {
        let count = self
            .run(room, |session| Ok((session.shuffle()?, Vec::new())))
            .await?;
        info!(room = %room, count, "queue shuffled");
        Ok(count)
    }

    /// Set the repeat counter of the current track, returning that track.
    pub async fn set_repeat(
        &self,
        room: &RoomId,
        authority: &Authority,
        count: i64,
    ) -> Result<Track, ServiceError> {
        let settings = self.inner.config.room(room);
        let (min, max) = (settings.min_repeats, settings.max_repeats);
        let track = self
            .run(room, |session| {
                Ok((session.set_repeat_count(authority, count, min, max)?, Vec::new()))
            })
            .await?;
        info!(room = %room, invoker = %authority, count, title = %track.title, "repeat count set");
        Ok(track)
    }

    /// Flip the infinite loop of the current track, returning the new value.
    pub async fn toggle_track_loop(
        &self,
        room: &RoomId,
        authority: &Authority,
    ) -> Result<bool, ServiceError> {
        let enabled = self
            .run(room, |session| {
                Ok((session.toggle_infinite_track_loop(authority)?, Vec::new()))
            })
            .await?;
        info!(room = %room, invoker = %authority, enabled, "track loop toggled");
        Ok(enabled)
    }

    /// Flip the infinite loop of the whole queue, returning the new value.
    pub async fn toggle_playlist_loop(
        &self,
        room: &RoomId,
        authority: &Authority,
    ) -> Result<bool, ServiceError> {
        let enabled = self
            .run(room, |session| {
                Ok((session.toggle_infinite_playlist_loop(authority)?, Vec::new()))
            })
            .await?;
        info!(room = %room, invoker = %authority, enabled, "playlist loop toggled");
        Ok(enabled)
    }

    /// Change the volume, returning the previous value.
    pub async fn set_volume(
        &self,
        room: &RoomId,
        authority: &Authority,
        volume: i64,
    ) -> Result<u16, ServiceError> {
        let previous = self
            .run(room, |session| Ok((session.set_volume(authority, volume)?, Vec::new())))
            .await?;
        info!(room = %room, invoker = %authority, previous, volume, "volume changed");
        Ok(previous)
    }

    /// Drop every pending track, returning how many were removed.
    pub async fn clear_queue(
        &self,
        room: &RoomId,
        authority: &Authority,
    ) -> Result<usize, ServiceError> {
        let count = self
            .run(room, |session| Ok((session.clear_queue(authority)?, Vec::new())))
            .await?;
        info!(room = %room, invoker = %authority, count, "queue cleared");
        Ok(count)
    }

    /// Destroy the room's session and release its player.
    pub async fn stop(&self, room: &RoomId, authority: &Authority) -> Result<(), ServiceError> {
        let shared = self.get(room)?;
        let mut session = shared.lock().await;
        if session.is_closed() {
            return Err(ServiceError::SessionNotFound);
        }
        session.authorize_stop(authority)?;
        self.teardown(&shared, &mut session);
        info!(room = %room, invoker = %authority, "playback session stopped");
        Ok(())
    }

    /// Record how many listeners remain in the room's voice channel.
    ///
    /// An empty channel arms the empty-room countdown unless one is already
    /// running; any listener cancels it. Commands and track starts leave it alone.
    pub async fn set_listener_count(&self, room: &RoomId, count: usize) -> Result<(), ServiceError> {
        let shared = self.get(room)?;
        let mut session = shared.lock().await;
        if session.is_closed() {
            return Err(ServiceError::SessionNotFound);
        }

        session.set_listeners(count);
        if count > 0 {
            session.empty_room_countdown().cancel();
        } else if !session.empty_room_countdown().is_armed() {
            self.arm_empty_room_timer(&mut session);
        }
        debug!(room = %room, count, "listener count updated");
        Ok(())
    }

    /// Read-only view of the room's session.
    pub async fn snapshot(&self, room: &RoomId) -> Result<SessionSnapshot, ServiceError> {
        let shared = self.get(room)?;
        let session = shared.lock().await;
        if session.is_closed() {
            return Err(ServiceError::SessionNotFound);
        }
        Ok(session.snapshot())
    }

    /// Deliver a lifecycle event reported by the room's player.
    pub async fn handle_player_event(
        &self,
        room: &RoomId,
        event: PlayerEvent,
    ) -> Result<(), ServiceError> {
        let shared = self.get(room)?;
        let mut session = shared.lock().await;
        if session.is_closed() {
            debug!(room = %room, ?event, "dropping player event for closed session");
            return Ok(());
        }

        if let PlayerEvent::Errored { track_id, message } = &event {
            warn!(room = %room, %track_id, %message, "player reported a track error");
        } else {
            debug!(room = %room, ?event, "player event");
        }
        let effects = session.intake(event);
        self.apply(&mut session, effects);
        Ok(())
    }

    /// Tear down every session, used on shutdown.
    pub async fn shutdown(&self) {
        let sessions: Vec<SharedSession> = self
            .inner
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for shared in sessions {
            let mut session = shared.lock().await;
            if !session.is_closed() {
                self.teardown(&shared, &mut session);
            }
        }
        info!("all playback sessions released");
    }

    /// Lock the room's session, retrying against a fresh one if it was closed meanwhile.
    async fn lock_open(&self, room: &RoomId) -> OwnedMutexGuard<PlaybackSession> {
        loop {
            let guard = self.get_or_create(room).lock_owned().await;
            if !guard.is_closed() {
                return guard;
            }
            debug!(room = %room, "session closed while waiting; retrying");
        }
    }

    /// Run a command under the room lock and apply the effects it produced.
    ///
    /// Any pending idle countdown is cancelled first; if the session is still
    /// idle afterwards a fresh countdown is armed.
    async fn run<T, F>(&self, room: &RoomId, command: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut PlaybackSession) -> Result<(T, Vec<Effect>), ServiceError>,
    {
        let mut session = self.lock_open(room).await;
        session.idle_countdown().cancel();

        let result = match command(&mut *session) {
            Ok((value, effects)) => {
                self.apply(&mut session, effects);
                Ok(value)
            }
            Err(err) => {
                debug!(room = %room, error = %err, "command rejected");
                Err(err)
            }
        };

        if session.is_idle() && !session.idle_countdown().is_armed() {
            self.arm_idle_timer(&mut session);
        }
        result
    }

    fn apply(&self, session: &mut PlaybackSession, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Start(track) => {
                    debug!(room = %session.room(), title = %track.title, "loading track");
                    session.player().load_and_start(&track);
                }
                Effect::Stop => session.player().stop(),
                Effect::Announce { key, attributes } => {
                    self.inner.sink.announce(session.room(), key, attributes)
                }
                Effect::ArmIdleTimer => self.arm_idle_timer(session),
                Effect::CancelIdleTimer => session.idle_countdown().cancel(),
            }
        }
    }

    fn arm_idle_timer(&self, session: &mut PlaybackSession) {
        let delay = self.inner.config.room(session.room()).leave_after_idle;
        let room = session.room().clone();
        let registry = self.clone();
        session.idle_countdown().arm(|generation| {
            tokio::spawn(async move {
                sleep(delay).await;
                registry.expire_idle(&room, generation).await;
            })
        });
        debug!(room = %session.room(), secs = delay.as_secs(), "idle countdown armed");
    }

    async fn expire_idle(&self, room: &RoomId, generation: u64) {
        let Ok(shared) = self.get(room) else {
            return;
        };
        let mut session = shared.lock().await;
        if session.is_closed() || !session.idle_countdown().claim(generation) {
            debug!(room = %room, generation, "idle countdown superseded");
            return;
        }
        if !session.is_idle() {
            debug!(room = %room, "session busy again; staying");
            return;
        }

        let idle_secs = self.inner.config.room(room).leave_after_idle.as_secs();
        info!(room = %room, idle_secs, "leaving room after inactivity");
        self.inner
            .sink
            .announce(room, SESSION_LEFT_IDLE, json!({ "idle_secs": idle_secs }));
        self.teardown(&shared, &mut session);
    }

    fn arm_empty_room_timer(&self, session: &mut PlaybackSession) {
        let delay = self.inner.config.room(session.room()).leave_when_empty;
        let room = session.room().clone();
        let registry = self.clone();
        session.empty_room_countdown().arm(|generation| {
            tokio::spawn(async move {
                sleep(delay).await;
                registry.expire_empty_room(&room, generation).await;
            })
        });
        debug!(room = %session.room(), secs = delay.as_secs(), "empty room countdown armed");
    }

    async fn expire_empty_room(&self, room: &RoomId, generation: u64) {
        let Ok(shared) = self.get(room) else {
            return;
        };
        let mut session = shared.lock().await;
        if session.is_closed() || !session.empty_room_countdown().claim(generation) {
            debug!(room = %room, generation, "empty room countdown superseded");
            return;
        }

        let empty_secs = self.inner.config.room(room).leave_when_empty.as_secs();
        info!(room = %room, empty_secs, "leaving room nobody listens to");
        self.inner
            .sink
            .announce(room, SESSION_LEFT_EMPTY, json!({ "empty_secs": empty_secs }));
        self.teardown(&shared, &mut session);
    }

    fn teardown(&self, shared: &SharedSession, session: &mut PlaybackSession) {
        session.close();
        self.inner
            .rooms
            .remove_if(session.room(), |_, existing| Arc::ptr_eq(existing, shared));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::{
        auth::MemberRoles,
        notify::{QUEUE_ENDED, TRACK_STARTED},
        player::TrackEndReason,
        testing::{FakePlayerFactory, PlayerCall, RecordingSink, dj, track},
    };

    fn registry(config: &str) -> (SessionRegistry, Arc<FakePlayerFactory>, Arc<RecordingSink>) {
        let players = Arc::new(FakePlayerFactory::default());
        let sink = Arc::new(RecordingSink::default());
        let config = Arc::new(AppConfig::from_json_str(config).unwrap());
        let registry = SessionRegistry::new(config, players.clone(), sink.clone());
        (registry, players, sink)
    }

    fn room() -> RoomId {
        RoomId::from("guild-1")
    }

    fn member(id: &str) -> Authority {
        Authority::Member(MemberRoles::regular(id))
    }

    async fn finish(registry: &SessionRegistry, track: &Track) {
        registry
            .handle_player_event(
                &room(),
                PlayerEvent::Ended {
                    track_id: track.id,
                    reason: TrackEndReason::Finished,
                },
            )
            .await
            .unwrap();
    }

    async fn confirm_start(registry: &SessionRegistry, track: &Track) {
        registry
            .handle_player_event(&room(), PlayerEvent::Started { track_id: track.id })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let (registry, players, _) = registry("{}");

        let first = registry.get_or_create(&room());
        let second = registry.get_or_create(&room());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(players.created(&room()), 1);
        assert_eq!(
            players.player(&room()).calls(),
            vec![PlayerCall::Volume(100)]
        );
        assert!(matches!(
            registry.get(&RoomId::from("other")),
            Err(ServiceError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn tracks_play_in_request_order() {
        let (registry, players, sink) = registry("{}");
        let a = track("a", "alice");
        let b = track("b", "bob");

        assert_eq!(registry.enqueue(&room(), a.clone()).await, Ok(None));
        assert_eq!(registry.enqueue(&room(), b.clone()).await, Ok(Some(1)));
        confirm_start(&registry, &a).await;
        finish(&registry, &a).await;
        confirm_start(&registry, &b).await;

        let loaded: Vec<_> = players.player(&room()).loaded().into_iter().map(|t| t.id).collect();
        assert_eq!(loaded, vec![a.id, b.id]);
        assert_eq!(sink.count(TRACK_STARTED), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_leaves_after_timeout() {
        let (registry, players, sink) =
            registry(r#"{ "defaults": { "leave_after_idle_secs": 5 } }"#);
        let a = track("a", "alice");
        registry.enqueue(&room(), a.clone()).await.unwrap();
        confirm_start(&registry, &a).await;
        finish(&registry, &a).await;
        assert_eq!(sink.count(QUEUE_ENDED), 1);
        assert!(registry.snapshot(&room()).await.unwrap().leaving_soon);

        sleep(Duration::from_secs(6)).await;

        assert_eq!(sink.count(SESSION_LEFT_IDLE), 1);
        assert!(matches!(
            registry.get(&room()),
            Err(ServiceError::SessionNotFound)
        ));
        assert_eq!(
            players.player(&room()).calls().last(),
            Some(&PlayerCall::Release)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn command_restarts_idle_countdown() {
        let (registry, _, sink) = registry(r#"{ "defaults": { "leave_after_idle_secs": 5 } }"#);
        let a = track("a", "alice");
        registry.enqueue(&room(), a.clone()).await.unwrap();
        confirm_start(&registry, &a).await;
        finish(&registry, &a).await;

        sleep(Duration::from_secs(3)).await;
        assert_eq!(
            registry.shuffle(&room()).await,
            Err(ServiceError::EmptyQueue)
        );

        sleep(Duration::from_secs(3)).await;
        assert!(registry.get(&room()).is_ok());
        assert_eq!(sink.count(SESSION_LEFT_IDLE), 0);

        sleep(Duration::from_secs(3)).await;
        assert!(registry.get(&room()).is_err());
        assert_eq!(sink.count(SESSION_LEFT_IDLE), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_a_track_cancels_idle_countdown() {
        let (registry, _, sink) = registry(r#"{ "defaults": { "leave_after_idle_secs": 5 } }"#);
        let a = track("a", "alice");
        registry.enqueue(&room(), a.clone()).await.unwrap();
        confirm_start(&registry, &a).await;
        finish(&registry, &a).await;

        sleep(Duration::from_secs(2)).await;
        let b = track("b", "alice");
        registry.enqueue(&room(), b.clone()).await.unwrap();
        confirm_start(&registry, &b).await;

        sleep(Duration::from_secs(10)).await;
        assert!(registry.get(&room()).is_ok());
        assert_eq!(sink.count(SESSION_LEFT_IDLE), 0);
    }

    #[tokio::test]
    async fn stop_requires_rights_and_destroys_session() {
        let (registry, players, _) = registry("{}");
        let a = track("a", "alice");
        registry.enqueue(&room(), a.clone()).await.unwrap();

        assert_eq!(
            registry.stop(&room(), &member("mallory")).await,
            Err(ServiceError::NotAuthorized)
        );
        registry
            .stop(&room(), &Authority::Member(dj("bob")))
            .await
            .unwrap();
        assert!(matches!(
            registry.snapshot(&room()).await,
            Err(ServiceError::SessionNotFound)
        ));

        registry.enqueue(&room(), track("b", "alice")).await.unwrap();
        assert_eq!(players.created(&room()), 2);
    }

    #[tokio::test]
    async fn events_for_unknown_rooms_are_reported() {
        let (registry, _, _) = registry("{}");
        assert_eq!(
            registry
                .handle_player_event(&room(), PlayerEvent::Paused)
                .await,
            Err(ServiceError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn skip_returns_skipped_track_and_starts_next() {
        let (registry, players, _) = registry("{}");
        let a = track("a", "alice");
        let b = track("b", "bob");
        registry.enqueue(&room(), a.clone()).await.unwrap();
        registry.enqueue(&room(), b.clone()).await.unwrap();
        confirm_start(&registry, &a).await;

        assert_eq!(
            registry.skip(&room(), &member("bob")).await,
            Err(ServiceError::NotAuthorized)
        );
        let skipped = registry.skip(&room(), &member("alice")).await.unwrap();
        assert_eq!(skipped.id, a.id);

        // the replaced end of the skipped track must not advance again
        registry
            .handle_player_event(
                &room(),
                PlayerEvent::Ended {
                    track_id: a.id,
                    reason: TrackEndReason::Replaced,
                },
            )
            .await
            .unwrap();
        let snapshot = registry.snapshot(&room()).await.unwrap();
        assert_eq!(snapshot.current.map(|t| t.id), Some(b.id));
        assert_eq!(players.player(&room()).loaded().len(), 2);
    }

    #[tokio::test]
    async fn batch_enqueue_keeps_request_order() {
        let (registry, players, _) = registry("{}");
        let batch = vec![track("a", "alice"), track("b", "alice"), track("c", "alice")];

        assert_eq!(registry.enqueue_many(&room(), batch.clone()).await, Ok(Some(1)));
        assert_eq!(
            registry.enqueue_many(&room(), vec![track("d", "bob")]).await,
            Ok(Some(3))
        );

        let snapshot = registry.snapshot(&room()).await.unwrap();
        assert_eq!(snapshot.current.map(|t| t.id), Some(batch[0].id));
        let titles: Vec<_> = snapshot.queue.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["b", "c", "d"]);
        assert_eq!(players.player(&room()).loaded().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enqueues_share_one_session() {
        let (registry, players, _) = registry("{}");

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .enqueue(&room(), track(&format!("t{i}"), "alice"))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(players.created(&room()), 1);
        assert_eq!(players.player(&room()).loaded().len(), 1);
        let snapshot = registry.snapshot(&room()).await.unwrap();
        assert!(snapshot.current.is_some());
        assert_eq!(snapshot.queue.len(), 31);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_room_leaves_even_while_playing() {
        let (registry, players, sink) =
            registry(r#"{ "defaults": { "leave_empty_channel_secs": 5 } }"#);
        let a = track("a", "alice");
        let b = track("b", "alice");
        registry.enqueue_many(&room(), vec![a.clone(), b.clone()]).await.unwrap();
        confirm_start(&registry, &a).await;

        registry.set_listener_count(&room(), 0).await.unwrap();
        let snapshot = registry.snapshot(&room()).await.unwrap();
        assert!(snapshot.leaving_soon);
        assert_eq!(snapshot.listeners, Some(0));

        sleep(Duration::from_secs(3)).await;
        finish(&registry, &a).await;
        confirm_start(&registry, &b).await;
        registry.enqueue(&room(), track("c", "bob")).await.unwrap();
        // a repeated zero must not restart the countdown
        registry.set_listener_count(&room(), 0).await.unwrap();

        sleep(Duration::from_secs(3)).await;
        assert_eq!(sink.count(SESSION_LEFT_EMPTY), 1);
        assert_eq!(sink.count(SESSION_LEFT_IDLE), 0);
        assert!(registry.get(&room()).is_err());
        assert_eq!(
            players.player(&room()).calls().last(),
            Some(&PlayerCall::Release)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn returning_listener_cancels_empty_room_countdown() {
        let (registry, _, sink) = registry(r#"{ "defaults": { "leave_empty_channel_secs": 5 } }"#);
        let a = track("a", "alice");
        registry.enqueue(&room(), a.clone()).await.unwrap();
        confirm_start(&registry, &a).await;

        registry.set_listener_count(&room(), 0).await.unwrap();
        sleep(Duration::from_secs(3)).await;
        registry.set_listener_count(&room(), 2).await.unwrap();
        assert!(!registry.snapshot(&room()).await.unwrap().leaving_soon);

        sleep(Duration::from_secs(10)).await;
        assert!(registry.get(&room()).is_ok());
        assert_eq!(sink.count(SESSION_LEFT_EMPTY), 0);
    }

    #[tokio::test]
    async fn listener_count_needs_a_session() {
        let (registry, _, _) = registry("{}");
        assert_eq!(
            registry.set_listener_count(&room(), 0).await,
            Err(ServiceError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn repeat_count_honours_room_minimum() {
        let (registry, _, _) = registry(r#"{ "defaults": { "min_repeats": 2 } }"#);
        let a = track("a", "alice");
        registry.enqueue(&room(), a.clone()).await.unwrap();
        confirm_start(&registry, &a).await;

        assert!(matches!(
            registry.set_repeat(&room(), &member("alice"), 1).await,
            Err(ServiceError::OutOfRange { min: 2, .. })
        ));
        assert_eq!(
            registry.set_repeat(&room(), &member("alice"), 2).await.map(|t| t.id),
            Ok(a.id)
        );
    }
}
