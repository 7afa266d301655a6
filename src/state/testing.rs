//! Recording fakes for the player and notification boundaries.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde_json::Value;

use crate::state::{
    auth::MemberRoles,
    notify::NotificationSink,
    player::{PlayerFactory, PlayerHandle},
    track::{RoomId, Track, UserId},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    Load(Track),
    Pause,
    Resume,
    Volume(u16),
    Stop,
    Release,
}

#[derive(Default)]
pub struct FakePlayer {
    calls: Mutex<Vec<PlayerCall>>,
    current: Mutex<Option<Track>>,
}

impl FakePlayer {
    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn loaded(&self) -> Vec<Track> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlayerCall::Load(track) => Some(track),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlayerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PlayerHandle for FakePlayer {
    fn load_and_start(&self, track: &Track) {
        *self.current.lock().unwrap() = Some(track.clone());
        self.record(PlayerCall::Load(track.clone()));
    }

    fn pause(&self) {
        self.record(PlayerCall::Pause);
    }

    fn resume(&self) {
        self.record(PlayerCall::Resume);
    }

    fn set_volume(&self, volume: u16) {
        self.record(PlayerCall::Volume(volume));
    }

    fn stop(&self) {
        *self.current.lock().unwrap() = None;
        self.record(PlayerCall::Stop);
    }

    fn current_track(&self) -> Option<Track> {
        self.current.lock().unwrap().clone()
    }

    fn release(&self) {
        self.record(PlayerCall::Release);
    }
}

#[derive(Default)]
pub struct FakePlayerFactory {
    players: DashMap<RoomId, Vec<Arc<FakePlayer>>>,
}

impl FakePlayerFactory {
    /// Most recent player created for `room`.
    pub fn player(&self, room: &RoomId) -> Arc<FakePlayer> {
        self.players
            .get(room)
            .and_then(|players| players.last().cloned())
            .unwrap()
    }

    pub fn created(&self, room: &RoomId) -> usize {
        self.players.get(room).map(|p| p.len()).unwrap_or(0)
    }
}

impl PlayerFactory for FakePlayerFactory {
    fn create(&self, room: &RoomId) -> Arc<dyn PlayerHandle> {
        let player = Arc::new(FakePlayer::default());
        self.players
            .entry(room.clone())
            .or_default()
            .push(player.clone());
        player
    }
}

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(RoomId, String, Value)>>,
}

impl RecordingSink {
    pub fn keys(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key, _)| key.clone())
            .collect()
    }

    pub fn count(&self, key: &str) -> usize {
        self.keys().iter().filter(|k| *k == key).count()
    }

    pub fn last(&self, key: &str) -> Option<Value> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, k, _)| k == key)
            .map(|(_, _, attributes)| attributes.clone())
    }
}

impl NotificationSink for RecordingSink {
    fn announce(&self, room: &RoomId, key: &str, attributes: Value) {
        self.messages
            .lock()
            .unwrap()
            .push((room.clone(), key.to_string(), attributes));
    }
}

pub fn track(title: &str, requester: &str) -> Track {
    Track::new(
        format!("uri:{title}"),
        title,
        1_000,
        None,
        UserId::from(requester),
    )
}

pub fn dj(id: &str) -> MemberRoles {
    MemberRoles {
        has_elevated_role: true,
        ..MemberRoles::regular(id)
    }
}
