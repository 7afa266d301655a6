pub mod auth;
pub mod notify;
pub mod player;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod sequencer;
pub mod session;
mod sse;
#[cfg(test)]
pub(crate) mod testing;
pub mod track;
pub mod vote;

use std::sync::Arc;

use crate::config::AppConfig;

pub use self::sse::SseHub;
use self::{
    auth::{DjRoleResolver, RoleResolver},
    notify::{NotificationSink, SseNotificationSink},
    player::{PlayerFactory, RemotePlayerFactory},
    registry::SessionRegistry,
    sequencer::VotingSequencer,
    sse::SseState,
};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration, room sessions, votes and SSE hubs.
pub struct AppState {
    config: Arc<AppConfig>,
    sse: SseState,
    sessions: SessionRegistry,
    votes: VotingSequencer,
    roles: Arc<dyn RoleResolver>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Players and announcements are routed through the SSE hubs.
    pub fn new(config: AppConfig) -> SharedState {
        let config = Arc::new(config);
        let sse = SseState::new(64, 64);
        let sink: Arc<dyn NotificationSink> =
            Arc::new(SseNotificationSink::new(sse.announcements().clone()));
        let players: Arc<dyn PlayerFactory> =
            Arc::new(RemotePlayerFactory::new(sse.player().clone()));
        let roles: Arc<dyn RoleResolver> = Arc::new(DjRoleResolver::new(config.clone()));
        Self::assemble(config, sse, players, sink, roles)
    }

    /// Build the state around custom collaborators.
    pub fn with_components(
        config: AppConfig,
        players: Arc<dyn PlayerFactory>,
        sink: Arc<dyn NotificationSink>,
        roles: Arc<dyn RoleResolver>,
    ) -> SharedState {
        Self::assemble(Arc::new(config), SseState::new(16, 16), players, sink, roles)
    }

    fn assemble(
        config: Arc<AppConfig>,
        sse: SseState,
        players: Arc<dyn PlayerFactory>,
        sink: Arc<dyn NotificationSink>,
        roles: Arc<dyn RoleResolver>,
    ) -> SharedState {
        let sessions = SessionRegistry::new(config.clone(), players, sink.clone());
        let votes = VotingSequencer::new(sink);
        Arc::new(Self {
            config,
            sse,
            sessions,
            votes,
            roles,
        })
    }

    /// Application configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of room playback sessions.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Sequencer running group votes.
    pub fn votes(&self) -> &VotingSequencer {
        &self.votes
    }

    /// Resolver mapping gateway identities to role flags.
    pub fn roles(&self) -> &dyn RoleResolver {
        self.roles.as_ref()
    }

    /// Broadcast hub used for the announcement SSE stream.
    pub fn announcements_sse(&self) -> &SseHub {
        self.sse.announcements()
    }

    /// Broadcast hub used for the player command SSE stream.
    pub fn player_sse(&self) -> &SseHub {
        self.sse.player()
    }
}
