//! Permission model for playback mutations.

use std::{fmt, sync::Arc};

use crate::{
    config::AppConfig,
    error::ServiceError,
    state::track::{RoomId, UserId},
};

/// Role flags of a room member as resolved from the identity source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRoles {
    /// Member identifier.
    pub user_id: UserId,
    /// Holds the room's DJ role.
    pub has_elevated_role: bool,
    /// Holds administrator level permissions in the room.
    pub is_room_admin: bool,
}

impl MemberRoles {
    /// Member without any special role.
    pub fn regular(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            has_elevated_role: false,
            is_room_admin: false,
        }
    }
}

/// Permission flags evaluated for a single command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationContext {
    /// The invoker requested the track the command acts on.
    pub is_track_sender: bool,
    /// The invoker holds the room's DJ role.
    pub has_elevated_role: bool,
    /// The invoker is a room administrator.
    pub is_room_admin: bool,
}

impl AuthorizationContext {
    /// Derive the flags for `member` acting on a track owned by `track_owner`.
    ///
    /// Commands that do not target a specific track pass `None`, leaving only
    /// the role based flags.
    pub fn evaluate(member: &MemberRoles, track_owner: Option<&UserId>) -> Self {
        Self {
            is_track_sender: track_owner.is_some_and(|owner| *owner == member.user_id),
            has_elevated_role: member.has_elevated_role,
            is_room_admin: member.is_room_admin,
        }
    }

    /// A mutation is allowed if any single flag grants it.
    pub fn permitted(&self) -> bool {
        self.is_track_sender || self.has_elevated_role || self.is_room_admin
    }
}

/// Who is asking for a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authority {
    /// A member acting on their own behalf.
    Member(MemberRoles),
    /// A group vote that reached its quorum; bypasses the member gate.
    Quorum,
}

impl Authority {
    /// Check the member gate against the owner of the targeted track.
    pub fn authorize(&self, track_owner: Option<&UserId>) -> Result<(), ServiceError> {
        match self {
            Authority::Quorum => Ok(()),
            Authority::Member(member) => {
                if AuthorizationContext::evaluate(member, track_owner).permitted() {
                    Ok(())
                } else {
                    Err(ServiceError::NotAuthorized)
                }
            }
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Member(member) => write!(f, "{}", member.user_id),
            Authority::Quorum => f.write_str("vote"),
        }
    }
}

/// Identity reported by the chat gateway together with a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    /// Chat user identifier.
    pub id: UserId,
    /// Role names held by the user in the room.
    pub roles: Vec<String>,
    /// Permission names held by the user in the room.
    pub permissions: Vec<String>,
}

/// Resolves the role flags of a requester inside a room.
pub trait RoleResolver: Send + Sync {
    /// Compute the member's role flags.
    fn resolve(&self, room: &RoomId, requester: &Requester) -> MemberRoles;
}

/// Resolver matching the per-room DJ role name and the configured superuser permissions.
pub struct DjRoleResolver {
    config: Arc<AppConfig>,
}

impl DjRoleResolver {
    /// Build a resolver backed by the shared configuration.
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl RoleResolver for DjRoleResolver {
    fn resolve(&self, room: &RoomId, requester: &Requester) -> MemberRoles {
        let dj_role = &self.config.room(room).dj_role_name;
        let superuser = self.config.superuser_permissions();

        MemberRoles {
            user_id: requester.id.clone(),
            has_elevated_role: requester
                .roles
                .iter()
                .any(|role| role.eq_ignore_ascii_case(dj_role)),
            is_room_admin: requester
                .permissions
                .iter()
                .any(|permission| superuser.iter().any(|p| p.eq_ignore_ascii_case(permission))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::from("alice")
    }

    #[test]
    fn resume_of_own_track_is_permitted() {
        let member = MemberRoles::regular("alice");
        let authority = Authority::Member(member);
        assert_eq!(authority.authorize(Some(&alice())), Ok(()));
    }

    #[test]
    fn dj_and_admin_may_control_any_track() {
        let dj = MemberRoles {
            has_elevated_role: true,
            ..MemberRoles::regular("bob")
        };
        let admin = MemberRoles {
            is_room_admin: true,
            ..MemberRoles::regular("carol")
        };

        assert!(Authority::Member(dj).authorize(Some(&alice())).is_ok());
        assert!(Authority::Member(admin).authorize(Some(&alice())).is_ok());
    }

    #[test]
    fn other_members_are_rejected() {
        let authority = Authority::Member(MemberRoles::regular("mallory"));
        assert_eq!(
            authority.authorize(Some(&alice())),
            Err(ServiceError::NotAuthorized)
        );
        assert_eq!(authority.authorize(None), Err(ServiceError::NotAuthorized));
    }

    #[test]
    fn quorum_bypasses_member_gate() {
        assert!(Authority::Quorum.authorize(Some(&alice())).is_ok());
    }

    #[test]
    fn context_flags_are_independent() {
        let context = AuthorizationContext::evaluate(&MemberRoles::regular("alice"), Some(&alice()));
        assert_eq!(
            context,
            AuthorizationContext {
                is_track_sender: true,
                has_elevated_role: false,
                is_room_admin: false,
            }
        );
    }

    #[test]
    fn resolver_matches_dj_role_and_superuser_permissions() {
        let config = Arc::new(
            AppConfig::from_json_str(r#"{ "rooms": { "guild-1": { "dj_role_name": "Selector" } } }"#)
                .unwrap(),
        );
        let resolver = DjRoleResolver::new(config);
        let requester = Requester {
            id: UserId::from("bob"),
            roles: vec!["selector".into()],
            permissions: vec!["MANAGE_SERVER".into()],
        };

        let in_guild = resolver.resolve(&RoomId::from("guild-1"), &requester);
        assert!(in_guild.has_elevated_role);
        assert!(in_guild.is_room_admin);

        let elsewhere = resolver.resolve(&RoomId::from("guild-2"), &requester);
        assert!(!elsewhere.has_elevated_role);
        assert!(elsewhere.is_room_admin);
    }
}
