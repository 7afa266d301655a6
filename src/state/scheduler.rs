//! Track scheduler: decides what plays next from player lifecycle events.
//!
//! The scheduler is a pure state machine. It mutates the queue and repeat
//! settings it is handed and returns the [`Effect`]s the owning session must
//! apply (player calls, announcements, idle timer changes).

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    notify::{QUEUE_ENDED, TRACK_ERROR, TRACK_REPEATING, TRACK_STARTED, TRACK_STARTED_PAUSED},
    player::{PlayerEvent, TrackEndReason},
    queue::TrackQueue,
    track::Track,
};

/// Phases of a room's playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    /// Nothing is playing.
    Idle,
    /// The current track is audible.
    Playing,
    /// The current track is paused.
    Paused,
    /// A track was handed to the player and its start is not confirmed yet.
    AwaitingNext,
    /// The session is being torn down; every event is ignored.
    Clearing,
}

/// Side effect requested by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Load and start the track on the player.
    Start(Track),
    /// Stop the player without loading anything.
    Stop,
    /// Render a message in the room.
    Announce {
        /// Message key.
        key: &'static str,
        /// Template attributes.
        attributes: Value,
    },
    /// Begin the idle teardown countdown.
    ArmIdleTimer,
    /// Cancel a pending idle teardown countdown.
    CancelIdleTimer,
}

/// Repeat and loop settings of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatSettings {
    /// Additional plays of the current track still scheduled.
    pub remaining: u32,
    /// Count requested by the last repeat command, used for ordinals.
    pub requested: u32,
    /// Replay the current track forever.
    pub track_loop: bool,
    /// Re-append finished tracks to the queue tail.
    pub playlist_loop: bool,
}

impl RepeatSettings {
    /// Schedule `count` additional plays; `0` clears the counter.
    pub fn set_count(&mut self, count: u32) {
        self.remaining = count;
        self.requested = count;
    }

    /// Whether any repeat or loop could replay a finished track.
    pub fn is_active(&self) -> bool {
        self.remaining > 0 || self.track_loop || self.playlist_loop
    }

    /// Drop the settings bound to the current track (counter and track loop).
    pub fn reset_track_bound(&mut self) {
        self.set_count(0);
        self.track_loop = false;
    }

    /// Consume one repeat, returning its 1-based ordinal.
    fn consume(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        self.requested.saturating_sub(self.remaining)
    }
}

/// State machine tracking the current track of a session.
#[derive(Debug, Clone)]
pub struct TrackScheduler {
    phase: SchedulerPhase,
    current: Option<Track>,
    paused_track: Option<Track>,
    announce_suppressed: bool,
}

impl Default for TrackScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackScheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            current: None,
            paused_track: None,
            announce_suppressed: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    /// Track handed to the player, confirmed or not.
    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Track that was playing when the player got paused.
    pub fn paused_track(&self) -> Option<&Track> {
        self.paused_track.as_ref()
    }

    /// Whether the session is being torn down.
    pub fn is_clearing(&self) -> bool {
        self.phase == SchedulerPhase::Clearing
    }

    /// Whether the next start notice will be skipped.
    pub fn is_announce_suppressed(&self) -> bool {
        self.announce_suppressed
    }

    /// Skip the "now playing" notice of the next start.
    pub fn suppress_next_announcement(&mut self) {
        self.announce_suppressed = true;
    }

    /// Start `track` on behalf of a command; its start is announced.
    pub fn start(&mut self, track: Track) -> Effect {
        self.announce_suppressed = false;
        self.begin(track)
    }

    /// Pop and start the queue head, or end the queue when nothing is pending.
    pub fn advance(&mut self, queue: &mut TrackQueue) -> Vec<Effect> {
        match queue.dequeue_next() {
            Some(next) => vec![self.start(next)],
            None => self.finish_queue(),
        }
    }

    /// Abandon the current track and move on to the queue head.
    pub fn skip(&mut self, queue: &mut TrackQueue) -> Vec<Effect> {
        self.current = None;
        match queue.dequeue_next() {
            Some(next) => vec![self.start(next)],
            None => {
                let mut effects = vec![Effect::Stop];
                effects.extend(self.finish_queue());
                effects
            }
        }
    }

    /// Record that the player was paused.
    pub fn mark_paused(&mut self) {
        if self.is_clearing() {
            return;
        }
        if let Some(track) = &self.current {
            self.paused_track = Some(track.clone());
            self.phase = SchedulerPhase::Paused;
        }
    }

    /// Record that the player was resumed.
    pub fn mark_resumed(&mut self) {
        if self.is_clearing() || self.paused_track.take().is_none() {
            return;
        }
        self.phase = if self.current.is_some() {
            SchedulerPhase::Playing
        } else {
            SchedulerPhase::Idle
        };
    }

    /// Enter teardown; later events are ignored.
    pub fn begin_clearing(&mut self) {
        self.phase = SchedulerPhase::Clearing;
        self.current = None;
        self.paused_track = None;
        self.announce_suppressed = false;
    }

    /// Feed a player lifecycle event into the machine.
    pub fn intake(
        &mut self,
        event: PlayerEvent,
        queue: &mut TrackQueue,
        repeat: &mut RepeatSettings,
    ) -> Vec<Effect> {
        if self.is_clearing() {
            debug!(?event, "ignoring player event during teardown");
            return Vec::new();
        }

        match event {
            PlayerEvent::Started { track_id } => self.on_started(track_id, repeat),
            PlayerEvent::Paused => {
                self.mark_paused();
                Vec::new()
            }
            PlayerEvent::Resumed => {
                self.mark_resumed();
                Vec::new()
            }
            PlayerEvent::Ended { track_id, reason } => {
                self.on_ended(track_id, reason, queue, repeat)
            }
            PlayerEvent::Errored { track_id, message } => {
                self.on_errored(track_id, message, queue, repeat)
            }
        }
    }

    fn begin(&mut self, track: Track) -> Effect {
        self.current = Some(track.clone());
        self.phase = SchedulerPhase::AwaitingNext;
        Effect::Start(track)
    }

    fn restart(&mut self, track: Track) -> Effect {
        self.announce_suppressed = true;
        self.begin(track)
    }

    fn finish_queue(&mut self) -> Vec<Effect> {
        self.phase = SchedulerPhase::Idle;
        self.current = None;
        self.announce_suppressed = false;
        vec![
            Effect::Announce {
                key: QUEUE_ENDED,
                attributes: json!({}),
            },
            Effect::ArmIdleTimer,
        ]
    }

    /// Take the current track if `track_id` refers to it.
    fn take_current(&mut self, track_id: Uuid) -> Option<Track> {
        match self.current.take() {
            Some(track) if track.id == track_id => Some(track),
            other => {
                self.current = other;
                debug!(%track_id, "ignoring event for a track that is no longer current");
                None
            }
        }
    }

    fn on_started(&mut self, track_id: Uuid, repeat: &RepeatSettings) -> Vec<Effect> {
        let Some(track) = self.current.clone().filter(|track| track.id == track_id) else {
            debug!(%track_id, "ignoring start of a track that is no longer current");
            return Vec::new();
        };

        let mut effects = vec![Effect::CancelIdleTimer];
        if self.paused_track.is_some() {
            // the player keeps its pause across loads
            self.paused_track = Some(track.clone());
            self.phase = SchedulerPhase::Paused;
            self.announce_suppressed = false;
            effects.push(Effect::Announce {
                key: TRACK_STARTED_PAUSED,
                attributes: track.attributes(),
            });
        } else {
            self.phase = SchedulerPhase::Playing;
            if self.announce_suppressed {
                self.announce_suppressed = false;
            } else {
                effects.push(Effect::Announce {
                    key: TRACK_STARTED,
                    attributes: track.attributes(),
                });
            }
        }

        if repeat.track_loop {
            self.announce_suppressed = true;
        }
        effects
    }

    fn on_ended(
        &mut self,
        track_id: Uuid,
        reason: TrackEndReason,
        queue: &mut TrackQueue,
        repeat: &mut RepeatSettings,
    ) -> Vec<Effect> {
        let Some(finished) = self.take_current(track_id) else {
            return Vec::new();
        };

        if queue.is_empty() && !repeat.is_active() {
            return self.finish_queue();
        }

        if repeat.track_loop {
            return vec![self.restart(finished)];
        }

        if repeat.playlist_loop {
            queue.enqueue(finished.replay());
            if reason.may_start_next() {
                return self.advance(queue);
            }
            self.phase = SchedulerPhase::Idle;
            return Vec::new();
        }

        if repeat.remaining > 0 {
            let ordinal = repeat.consume();
            let mut attributes = finished.attributes();
            attributes["current_repeat"] = json!(ordinal);
            attributes["remaining"] = json!(repeat.remaining);
            return vec![
                Effect::Announce {
                    key: TRACK_REPEATING,
                    attributes,
                },
                self.restart(finished),
            ];
        }

        if reason.may_start_next() {
            return self.advance(queue);
        }

        self.phase = SchedulerPhase::Idle;
        Vec::new()
    }

    fn on_errored(
        &mut self,
        track_id: Uuid,
        message: String,
        queue: &mut TrackQueue,
        repeat: &mut RepeatSettings,
    ) -> Vec<Effect> {
        let Some(failed) = self.take_current(track_id) else {
            return Vec::new();
        };
        repeat.reset_track_bound();

        let mut attributes = failed.attributes();
        attributes["message"] = json!(message);
        let mut effects = vec![Effect::Announce {
            key: TRACK_ERROR,
            attributes,
        }];
        effects.extend(self.advance(queue));
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::track::UserId;

    fn track(title: &str) -> Track {
        Track::new(format!("uri:{title}"), title, 1_000, None, UserId::from("alice"))
    }

    struct Harness {
        scheduler: TrackScheduler,
        queue: TrackQueue,
        repeat: RepeatSettings,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                scheduler: TrackScheduler::new(),
                queue: TrackQueue::new(),
                repeat: RepeatSettings::default(),
            }
        }

        fn feed(&mut self, event: PlayerEvent) -> Vec<Effect> {
            self.scheduler
                .intake(event, &mut self.queue, &mut self.repeat)
        }

        fn play(&mut self, track: Track) -> Track {
            self.scheduler.start(track.clone());
            self.feed(PlayerEvent::Started { track_id: track.id });
            track
        }

        fn finish(&mut self) -> Vec<Effect> {
            let track_id = self.scheduler.current().map(|t| t.id).unwrap();
            self.feed(PlayerEvent::Ended {
                track_id,
                reason: TrackEndReason::Finished,
            })
        }

        /// Finish the current track and confirm whatever starts next.
        fn cycle(&mut self) -> Vec<Effect> {
            let mut effects = self.finish();
            if let Some(track_id) = started(&effects).map(|t| t.id) {
                effects.extend(self.feed(PlayerEvent::Started { track_id }));
            }
            effects
        }
    }

    fn announced(effects: &[Effect], key: &str) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Announce { key: k, .. } if *k == key))
            .count()
    }

    fn started(effects: &[Effect]) -> Option<&Track> {
        effects.iter().find_map(|e| match e {
            Effect::Start(track) => Some(track),
            _ => None,
        })
    }

    #[test]
    fn start_is_announced_once_confirmed() {
        let mut h = Harness::new();
        let song = track("a");

        let effect = h.scheduler.start(song.clone());
        assert_eq!(effect, Effect::Start(song.clone()));
        assert_eq!(h.scheduler.phase(), SchedulerPhase::AwaitingNext);

        let effects = h.feed(PlayerEvent::Started { track_id: song.id });
        assert_eq!(effects[0], Effect::CancelIdleTimer);
        assert_eq!(announced(&effects, TRACK_STARTED), 1);
        assert_eq!(h.scheduler.phase(), SchedulerPhase::Playing);
    }

    #[test]
    fn empty_queue_ends_and_arms_idle_timer() {
        let mut h = Harness::new();
        h.play(track("a"));

        let effects = h.finish();
        assert_eq!(announced(&effects, QUEUE_ENDED), 1);
        assert!(effects.contains(&Effect::ArmIdleTimer));
        assert_eq!(h.scheduler.phase(), SchedulerPhase::Idle);
        assert!(h.scheduler.current().is_none());
    }

    #[test]
    fn natural_end_advances_in_fifo_order() {
        let mut h = Harness::new();
        h.play(track("a"));
        h.queue.enqueue(track("b"));
        h.queue.enqueue(track("c"));

        let effects = h.cycle();
        assert_eq!(started(&effects).unwrap().title, "b");
        let effects = h.cycle();
        assert_eq!(started(&effects).unwrap().title, "c");
        assert!(h.queue.is_empty());
    }

    #[test]
    fn repeat_count_plays_exactly_that_many_extra_times() {
        let mut h = Harness::new();
        let song = h.play(track("a"));
        h.queue.enqueue(track("b"));
        h.repeat.set_count(3);

        for expected_ordinal in 1..=3u32 {
            let effects = h.cycle();
            let restarted = started(&effects).unwrap();
            assert_eq!(restarted.id, song.id);
            let repeating = effects
                .iter()
                .find_map(|e| match e {
                    Effect::Announce { key, attributes } if *key == TRACK_REPEATING => {
                        Some(attributes.clone())
                    }
                    _ => None,
                })
                .unwrap();
            assert_eq!(repeating["current_repeat"], expected_ordinal);
            assert_eq!(repeating["remaining"], 3 - expected_ordinal);
            assert_eq!(announced(&effects, TRACK_STARTED), 0);
            assert_eq!(h.queue.len(), 1);
        }

        let effects = h.cycle();
        assert_eq!(started(&effects).unwrap().title, "b");
        assert_eq!(announced(&effects, TRACK_STARTED), 1);
    }

    #[test]
    fn track_loop_restarts_without_spamming() {
        let mut h = Harness::new();
        let song = h.play(track("a"));
        h.queue.enqueue(track("b"));
        h.repeat.track_loop = true;

        for _ in 0..5 {
            let effects = h.cycle();
            assert_eq!(started(&effects).unwrap().id, song.id);
            assert_eq!(announced(&effects, TRACK_STARTED), 0);
        }
        assert_eq!(h.queue.len(), 1);

        h.repeat.track_loop = false;
        h.scheduler.skip(&mut h.queue);
        let next = h.scheduler.current().cloned().unwrap();
        let effects = h.feed(PlayerEvent::Started { track_id: next.id });
        assert_eq!(announced(&effects, TRACK_STARTED), 1);
    }

    #[test]
    fn playlist_loop_appends_finished_track() {
        let mut h = Harness::new();
        h.play(track("a"));
        h.queue.enqueue(track("b"));
        h.repeat.playlist_loop = true;

        let effects = h.cycle();
        assert_eq!(started(&effects).unwrap().title, "b");
        let pending: Vec<String> = h.queue.snapshot().into_iter().map(|t| t.title).collect();
        assert_eq!(pending, vec!["a"]);

        let effects = h.cycle();
        assert_eq!(started(&effects).unwrap().title, "a");
    }

    #[test]
    fn non_advancing_reason_leaves_queue_untouched() {
        let mut h = Harness::new();
        let song = h.play(track("a"));
        h.queue.enqueue(track("b"));

        let effects = h.feed(PlayerEvent::Ended {
            track_id: song.id,
            reason: TrackEndReason::Stopped,
        });
        assert!(effects.is_empty());
        assert_eq!(h.queue.len(), 1);
        assert_eq!(h.scheduler.phase(), SchedulerPhase::Idle);
    }

    #[test]
    fn stale_end_events_are_ignored() {
        let mut h = Harness::new();
        let first = h.play(track("a"));
        h.queue.enqueue(track("b"));
        h.scheduler.skip(&mut h.queue);

        let effects = h.feed(PlayerEvent::Ended {
            track_id: first.id,
            reason: TrackEndReason::Replaced,
        });
        assert!(effects.is_empty());
        assert_eq!(h.scheduler.current().unwrap().title, "b");
    }

    #[test]
    fn error_announces_and_moves_on_without_requeue() {
        let mut h = Harness::new();
        let song = h.play(track("a"));
        h.queue.enqueue(track("b"));
        h.repeat.playlist_loop = true;

        let effects = h.feed(PlayerEvent::Errored {
            track_id: song.id,
            message: "decoder failure".into(),
        });
        assert_eq!(announced(&effects, TRACK_ERROR), 1);
        assert_eq!(started(&effects).unwrap().title, "b");
        assert!(h.queue.is_empty());
    }

    #[test]
    fn error_on_last_track_ends_queue() {
        let mut h = Harness::new();
        let song = h.play(track("a"));

        let effects = h.feed(PlayerEvent::Errored {
            track_id: song.id,
            message: "stuck".into(),
        });
        assert_eq!(announced(&effects, TRACK_ERROR), 1);
        assert_eq!(announced(&effects, QUEUE_ENDED), 1);
        assert!(effects.contains(&Effect::ArmIdleTimer));
    }

    #[test]
    fn errored_track_drops_its_repeats() {
        let mut h = Harness::new();
        let song = h.play(track("a"));
        h.repeat.set_count(2);
        h.repeat.track_loop = true;

        let effects = h.feed(PlayerEvent::Errored {
            track_id: song.id,
            message: "decoder failure".into(),
        });
        assert!(started(&effects).is_none());
        assert_eq!(h.repeat.remaining, 0);
        assert!(!h.repeat.track_loop);
    }

    #[test]
    fn start_while_paused_uses_paused_notice() {
        let mut h = Harness::new();
        h.play(track("a"));
        h.queue.enqueue(track("b"));
        h.feed(PlayerEvent::Paused);
        assert_eq!(h.scheduler.phase(), SchedulerPhase::Paused);

        let effects = h.cycle();
        assert_eq!(announced(&effects, TRACK_STARTED_PAUSED), 1);
        assert_eq!(h.scheduler.phase(), SchedulerPhase::Paused);
        assert_eq!(h.scheduler.paused_track().unwrap().title, "b");

        h.feed(PlayerEvent::Resumed);
        assert_eq!(h.scheduler.phase(), SchedulerPhase::Playing);
        assert!(h.scheduler.paused_track().is_none());
    }

    #[test]
    fn events_during_teardown_are_ignored() {
        let mut h = Harness::new();
        let song = h.play(track("a"));
        h.queue.enqueue(track("b"));
        h.scheduler.begin_clearing();

        let effects = h.feed(PlayerEvent::Ended {
            track_id: song.id,
            reason: TrackEndReason::Finished,
        });
        assert!(effects.is_empty());
        assert_eq!(h.queue.len(), 1);

        h.feed(PlayerEvent::Paused);
        assert!(h.scheduler.paused_track().is_none());
    }
}
