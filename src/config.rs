//! Application-level configuration loading, including per-room playback and voting settings.

use std::{collections::HashMap, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::track::RoomId;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "JUKEBOX_BACK_CONFIG_PATH";
/// Highest volume a room may be configured with.
pub const MAX_VOLUME: u16 = 150;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    defaults: RoomSettings,
    rooms: HashMap<RoomId, RoomSettings>,
    superuser_permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// Settings applied to a single room, either the global defaults or a per-room override.
pub struct RoomSettings {
    /// Role name granting elevated playback control.
    pub dj_role_name: String,
    /// How long an idle session waits before leaving the room.
    pub leave_after_idle: Duration,
    /// How long a session stays once nobody listens in the voice channel.
    pub leave_when_empty: Duration,
    /// Volume applied to freshly created sessions.
    pub default_volume: u16,
    /// Smallest non-zero count accepted by the repeat command.
    pub min_repeats: u32,
    /// Upper bound accepted by the repeat command.
    pub max_repeats: u32,
    /// Group vote settings.
    pub voting: VotingSettings,
}

#[derive(Debug, Clone, PartialEq)]
/// Parameters of group votes in a room.
pub struct VotingSettings {
    /// Whether vote-gated actions may be proposed at all.
    pub enabled: bool,
    /// Fraction of eligible voters whose confirmation applies the action.
    pub ratio: f64,
    /// Time after which an unresolved vote times out.
    pub max_duration: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            dj_role_name: "DJ".into(),
            leave_after_idle: Duration::from_secs(300),
            leave_when_empty: Duration::from_secs(60),
            default_volume: 100,
            min_repeats: 1,
            max_repeats: 30,
            voting: VotingSettings::default(),
        }
    }
}

impl Default for VotingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio: 0.5,
            max_duration: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        rooms = app_config.rooms.len(),
                        "loaded room settings from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Settings for `room`, falling back to the global defaults.
    pub fn room(&self, room: &RoomId) -> &RoomSettings {
        self.rooms.get(room).unwrap_or(&self.defaults)
    }

    /// Chat permissions treated as room administrator rights.
    pub fn superuser_permissions(&self) -> &[String] {
        &self.superuser_permissions
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: RoomSettings::default(),
            rooms: HashMap::new(),
            superuser_permissions: default_superuser_permissions(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    defaults: RawRoomSettings,
    rooms: HashMap<String, RawRoomSettings>,
    superuser_permissions: Option<Vec<String>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = value.defaults.apply_to(&RoomSettings::default());
        let rooms = value
            .rooms
            .into_iter()
            .map(|(room, raw)| {
                let settings = raw.apply_to(&defaults);
                (RoomId::from(room), settings)
            })
            .collect();
        Self {
            defaults,
            rooms,
            superuser_permissions: value
                .superuser_permissions
                .unwrap_or_else(default_superuser_permissions),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of a room settings block; absent keys inherit from the parent.
struct RawRoomSettings {
    dj_role_name: Option<String>,
    leave_after_idle_secs: Option<u64>,
    leave_empty_channel_secs: Option<u64>,
    default_volume: Option<u16>,
    min_repeats: Option<u32>,
    max_repeats: Option<u32>,
    voting_enabled: Option<bool>,
    vote_ratio: Option<f64>,
    max_vote_secs: Option<u64>,
}

impl RawRoomSettings {
    fn apply_to(self, base: &RoomSettings) -> RoomSettings {
        let default_volume = match self.default_volume {
            Some(volume) if volume > MAX_VOLUME => {
                warn!(volume, max = MAX_VOLUME, "default volume too high; clamping");
                MAX_VOLUME
            }
            Some(volume) => volume,
            None => base.default_volume,
        };
        let max_repeats = self.max_repeats.unwrap_or(base.max_repeats);
        let min_repeats = match self.min_repeats.unwrap_or(base.min_repeats) {
            min if min > max_repeats => {
                warn!(min, max = max_repeats, "min repeats above max repeats; clamping");
                max_repeats
            }
            min => min,
        };
        let ratio = match self.vote_ratio {
            Some(ratio) if ratio > 0.0 && ratio <= 1.0 => ratio,
            Some(ratio) => {
                warn!(ratio, "vote ratio must be within (0, 1]; keeping inherited value");
                base.voting.ratio
            }
            None => base.voting.ratio,
        };

        RoomSettings {
            dj_role_name: self
                .dj_role_name
                .unwrap_or_else(|| base.dj_role_name.clone()),
            leave_after_idle: self
                .leave_after_idle_secs
                .map(Duration::from_secs)
                .unwrap_or(base.leave_after_idle),
            leave_when_empty: self
                .leave_empty_channel_secs
                .map(Duration::from_secs)
                .unwrap_or(base.leave_when_empty),
            default_volume,
            min_repeats,
            max_repeats,
            voting: VotingSettings {
                enabled: self.voting_enabled.unwrap_or(base.voting.enabled),
                ratio,
                max_duration: self
                    .max_vote_secs
                    .map(Duration::from_secs)
                    .unwrap_or(base.voting.max_duration),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_superuser_permissions() -> Vec<String> {
    vec!["ADMINISTRATOR".into(), "MANAGE_SERVER".into()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        let settings = config.room(&RoomId::from("any"));

        assert_eq!(settings, &RoomSettings::default());
        assert_eq!(config.superuser_permissions(), ["ADMINISTRATOR", "MANAGE_SERVER"]);
    }

    #[test]
    fn room_overrides_inherit_from_defaults() {
        let config = AppConfig::from_json_str(
            r#"{
                "defaults": { "dj_role_name": "Selector", "max_vote_secs": 10 },
                "rooms": { "guild-1": { "voting_enabled": false, "leave_after_idle_secs": 5 } }
            }"#,
        )
        .unwrap();

        let overridden = config.room(&RoomId::from("guild-1"));
        assert_eq!(overridden.dj_role_name, "Selector");
        assert!(!overridden.voting.enabled);
        assert_eq!(overridden.voting.max_duration, Duration::from_secs(10));
        assert_eq!(overridden.leave_after_idle, Duration::from_secs(5));

        let other = config.room(&RoomId::from("guild-2"));
        assert!(other.voting.enabled);
        assert_eq!(other.leave_after_idle, Duration::from_secs(300));
    }

    #[test]
    fn out_of_bounds_values_are_sanitised() {
        let config = AppConfig::from_json_str(
            r#"{ "defaults": { "default_volume": 400, "vote_ratio": 1.5 } }"#,
        )
        .unwrap();
        let settings = config.room(&RoomId::from("any"));

        assert_eq!(settings.default_volume, MAX_VOLUME);
        assert_eq!(settings.voting.ratio, 0.5);
    }

    #[test]
    fn repeat_bounds_and_empty_channel_delay_are_read() {
        let config = AppConfig::from_json_str(
            r#"{
                "defaults": { "min_repeats": 2, "leave_empty_channel_secs": 15 },
                "rooms": { "guild-1": { "max_repeats": 1 } }
            }"#,
        )
        .unwrap();

        let defaults = config.room(&RoomId::from("any"));
        assert_eq!(defaults.min_repeats, 2);
        assert_eq!(defaults.leave_when_empty, Duration::from_secs(15));

        let clamped = config.room(&RoomId::from("guild-1"));
        assert_eq!((clamped.min_repeats, clamped.max_repeats), (1, 1));
        assert_eq!(clamped.leave_when_empty, Duration::from_secs(15));
    }
}
