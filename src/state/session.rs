use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    config::MAX_VOLUME,
    error::ServiceError,
    state::{
        auth::Authority,
        player::{PlayerEvent, PlayerHandle},
        queue::TrackQueue,
        scheduler::{Effect, RepeatSettings, SchedulerPhase, TrackScheduler},
        track::{RoomId, Track, UserId},
    },
};

/// A cancellable teardown countdown.
///
/// Each arming gets a fresh generation so a task that fires after being
/// cancelled or replaced can tell it no longer owns the countdown.
#[derive(Default)]
pub(crate) struct Countdown {
    generation: u64,
    pending: Option<(u64, JoinHandle<()>)>,
}

impl Countdown {
    pub(crate) fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Replace any pending task with the one built by `spawn` for a new generation.
    pub(crate) fn arm(&mut self, spawn: impl FnOnce(u64) -> JoinHandle<()>) {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        self.pending = Some((generation, spawn(generation)));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some((_, task)) = self.pending.take() {
            task.abort();
        }
    }

    /// Claim the countdown of `generation` from inside its own task.
    ///
    /// Returns `false` when that countdown was cancelled or replaced meanwhile.
    pub(crate) fn claim(&mut self, generation: u64) -> bool {
        match &self.pending {
            Some((armed, _)) if *armed == generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

/// Read-only view of a session at one point in time.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Room owning the session.
    pub room: RoomId,
    /// Scheduler phase.
    pub phase: SchedulerPhase,
    /// Track handed to the player.
    pub current: Option<Track>,
    /// Whether the player is paused.
    pub paused: bool,
    /// Pending tracks in play order.
    pub queue: Vec<Track>,
    /// Repeat and loop settings.
    pub repeat: RepeatSettings,
    /// Output volume.
    pub volume: u16,
    /// Last reported number of listeners in the voice channel.
    pub listeners: Option<usize>,
    /// Whether a teardown countdown (idle or empty room) is running.
    pub leaving_soon: bool,
}

/// Per-room playback state: queue, scheduler, repeat settings and player.
///
/// Every mutation happens under the room mutex held by the registry, which
/// also applies the returned [`Effect`]s.
pub struct PlaybackSession {
    room: RoomId,
    queue: TrackQueue,
    repeat: RepeatSettings,
    scheduler: TrackScheduler,
    volume: u16,
    player: Arc<dyn PlayerHandle>,
    idle: Countdown,
    empty_room: Countdown,
    listeners: Option<usize>,
    closed: bool,
}

impl PlaybackSession {
    /// Fresh session bound to `player`.
    pub fn new(room: RoomId, player: Arc<dyn PlayerHandle>, volume: u16) -> Self {
        Self {
            room,
            queue: TrackQueue::new(),
            repeat: RepeatSettings::default(),
            scheduler: TrackScheduler::new(),
            volume,
            player,
            idle: Countdown::default(),
            empty_room: Countdown::default(),
            listeners: None,
            closed: false,
        }
    }

    /// Room owning the session.
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Player bound to the room's voice connection.
    pub fn player(&self) -> &Arc<dyn PlayerHandle> {
        &self.player
    }

    /// Track handed to the player, if any.
    pub fn current(&self) -> Option<&Track> {
        self.scheduler.current()
    }

    /// Pending tracks.
    pub fn queue(&self) -> &TrackQueue {
        &self.queue
    }

    /// Repeat counter and loop flags.
    pub fn repeat(&self) -> &RepeatSettings {
        &self.repeat
    }

    /// Scheduler driving the current track.
    pub fn scheduler(&self) -> &TrackScheduler {
        &self.scheduler
    }

    /// Output volume, `0..=150`.
    pub fn volume(&self) -> u16 {
        self.volume
    }

    /// Whether the session was torn down; a closed session is never mutated again.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Nothing plays and nothing is pending.
    pub fn is_idle(&self) -> bool {
        !self.closed && self.scheduler.current().is_none() && self.queue.is_empty()
    }

    /// Queue a track, starting it right away when nothing is playing.
    ///
    /// Returns the track's queue position, or `None` when it started playing.
    pub fn enqueue(&mut self, track: Track) -> (Option<usize>, Vec<Effect>) {
        self.enqueue_many(vec![track])
    }

    /// Queue `tracks` in order, starting the first one when nothing is playing.
    ///
    /// Returns the queue position of the first track still pending, or `None`
    /// when the batch was a single track that started playing.
    pub fn enqueue_many(&mut self, tracks: Vec<Track>) -> (Option<usize>, Vec<Effect>) {
        let Some(head) = tracks.first().map(|track| track.id) else {
            return (None, Vec::new());
        };
        let count = tracks.len();
        let first_position = self.queue.len() + 1;
        for track in tracks {
            self.queue.enqueue(track);
        }
        if self.scheduler.current().is_some() {
            return (Some(first_position), Vec::new());
        }

        let effects = self.scheduler.advance(&mut self.queue);
        let position = match self.scheduler.current() {
            Some(started) if started.id == head => (count > 1).then_some(first_position),
            Some(_) => Some(first_position - 1),
            None => Some(first_position),
        };
        (position, effects)
    }

    /// Schedule `count` additional plays of the current track; `0` clears.
    ///
    /// Any other count must fall within `min..=max`.
    pub fn set_repeat_count(
        &mut self,
        authority: &Authority,
        count: i64,
        min: u32,
        max: u32,
    ) -> Result<Track, ServiceError> {
        let current = self.authorize_current(authority)?;
        let (min, max) = (i64::from(min), i64::from(max));
        if count != 0 && !(min..=max).contains(&count) {
            return Err(ServiceError::OutOfRange {
                value: count,
                min,
                max,
            });
        }

        let count = count as u32;
        self.repeat.set_count(count);
        if count > 0 {
            self.scheduler.suppress_next_announcement();
        }
        Ok(current)
    }

    /// Flip the infinite track loop, returning the new value.
    pub fn toggle_infinite_track_loop(&mut self, authority: &Authority) -> Result<bool, ServiceError> {
        self.authorize_current(authority)?;
        self.repeat.track_loop = !self.repeat.track_loop;
        Ok(self.repeat.track_loop)
    }

    /// Flip the infinite playlist loop, returning the new value.
    pub fn toggle_infinite_playlist_loop(
        &mut self,
        authority: &Authority,
    ) -> Result<bool, ServiceError> {
        authority.authorize(self.current_owner())?;
        self.repeat.playlist_loop = !self.repeat.playlist_loop;
        Ok(self.repeat.playlist_loop)
    }

    /// Pause the current track.
    pub fn pause(&mut self, authority: &Authority) -> Result<Track, ServiceError> {
        let current = self.authorize_current(authority)?;
        if self.scheduler.paused_track().is_some() {
            return Err(ServiceError::TrackAlreadyPaused);
        }
        self.player.pause();
        self.scheduler.mark_paused();
        Ok(current)
    }

    /// Resume the paused track; only its requester, a DJ or an admin may do so.
    pub fn resume(&mut self, authority: &Authority) -> Result<Track, ServiceError> {
        let Some(paused) = self.scheduler.paused_track().cloned() else {
            return Err(if self.scheduler.current().is_none() {
                ServiceError::NoActiveTrack
            } else {
                ServiceError::TrackNotPaused
            });
        };
        authority.authorize(Some(&paused.requester))?;
        self.player.resume();
        self.scheduler.mark_resumed();
        Ok(paused)
    }

    /// Change the output volume, returning the previous value.
    pub fn set_volume(&mut self, authority: &Authority, volume: i64) -> Result<u16, ServiceError> {
        authority.authorize(self.current_owner())?;
        let max = i64::from(MAX_VOLUME);
        if !(0..=max).contains(&volume) {
            return Err(ServiceError::OutOfRange {
                value: volume,
                min: 0,
                max,
            });
        }

        let previous = self.volume;
        self.volume = volume as u16;
        self.player.set_volume(self.volume);
        Ok(previous)
    }

    /// Abandon the current track and play the next one.
    ///
    /// Repeat counter and track loop are bound to the skipped track and reset.
    pub fn skip(&mut self, authority: &Authority) -> Result<(Track, Vec<Effect>), ServiceError> {
        let skipped = self.authorize_current(authority)?;
        self.repeat.reset_track_bound();
        if self.repeat.playlist_loop {
            self.queue.enqueue(skipped.replay());
        }
        let effects = self.scheduler.skip(&mut self.queue);
        Ok((skipped, effects))
    }

    /// Drop every pending track ahead of `position` and play the one at `position`.
    pub fn skip_to(
        &mut self,
        authority: &Authority,
        position: usize,
    ) -> Result<(Track, Vec<Effect>), ServiceError> {
        self.authorize_current(authority)?;
        let next = self.queue.skip_to(position)?;
        self.repeat.reset_track_bound();
        let effect = self.scheduler.start(next.clone());
        Ok((next, vec![effect]))
    }

    /// Remove the pending track at `position`.
    pub fn remove_at(&mut self, authority: &Authority, position: usize) -> Result<Track, ServiceError> {
        let owner = self.queue.get(position)?.requester.clone();
        authority.authorize(Some(&owner))?;
        self.queue.remove_at(position)
    }

    /// Shuffle the pending tracks, returning how many were shuffled.
    pub fn shuffle(&mut self) -> Result<usize, ServiceError> {
        if self.queue.is_empty() {
            return Err(ServiceError::EmptyQueue);
        }
        self.queue.shuffle();
        Ok(self.queue.len())
    }

    /// Drop every pending track, returning how many were removed.
    pub fn clear_queue(&mut self, authority: &Authority) -> Result<usize, ServiceError> {
        if self.queue.is_empty() {
            return Err(ServiceError::EmptyQueue);
        }
        authority.authorize(None)?;
        Ok(self.queue.clear())
    }

    /// Check that `authority` may tear the session down.
    pub fn authorize_stop(&self, authority: &Authority) -> Result<(), ServiceError> {
        authority.authorize(self.current_owner())
    }

    /// Feed a player lifecycle event to the scheduler.
    pub fn intake(&mut self, event: PlayerEvent) -> Vec<Effect> {
        self.scheduler
            .intake(event, &mut self.queue, &mut self.repeat)
    }

    /// Copy out the state shown to clients.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            room: self.room.clone(),
            phase: self.scheduler.phase(),
            current: self.scheduler.current().cloned(),
            paused: self.scheduler.paused_track().is_some(),
            queue: self.queue.snapshot(),
            repeat: self.repeat.clone(),
            volume: self.volume,
            listeners: self.listeners,
            leaving_soon: self.idle.is_armed() || self.empty_room.is_armed(),
        }
    }

    pub(crate) fn set_listeners(&mut self, count: usize) {
        self.listeners = Some(count);
    }

    /// Tear the session down: cancel the countdowns, drop state and release the player.
    pub fn close(&mut self) {
        self.idle.cancel();
        self.empty_room.cancel();
        self.scheduler.begin_clearing();
        self.queue.clear();
        self.repeat = RepeatSettings::default();
        self.player.release();
        self.closed = true;
    }

    pub(crate) fn idle_countdown(&mut self) -> &mut Countdown {
        &mut self.idle
    }

    pub(crate) fn empty_room_countdown(&mut self) -> &mut Countdown {
        &mut self.empty_room
    }

    fn current_owner(&self) -> Option<&UserId> {
        self.scheduler.current().map(|track| &track.requester)
    }

    fn authorize_current(&self, authority: &Authority) -> Result<Track, ServiceError> {
        let current = self
            .scheduler
            .current()
            .cloned()
            .ok_or(ServiceError::NoActiveTrack)?;
        authority.authorize(Some(&current.requester))?;
        Ok(current)
    }
}
