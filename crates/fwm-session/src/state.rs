//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use serde::Serialize;

use crate::profile::Profile;
use crate::role::Role;

/// Per-session lifecycle.
///
/// `Unauthenticated -> Authenticating -> Authenticated -> Unauthenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated { needs_setup: bool },
}

impl SessionState {
    pub fn for_profile(profile: &Profile) -> Self {
        SessionState::Authenticated {
            needs_setup: profile.needs_setup,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

/// Where the user should be sent for a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingTarget {
    Login,
    Setup,
    Dashboard(Role),
}

impl RoutingTarget {
    pub fn resolve(state: SessionState, profile: Option<&Profile>) -> Self {
        match (state, profile) {
            (SessionState::Authenticated { needs_setup: true }, _) => RoutingTarget::Setup,
            (SessionState::Authenticated { needs_setup: false }, Some(profile)) => {
                RoutingTarget::Dashboard(profile.role)
            }
            _ => RoutingTarget::Login,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fwm_remote::Identity;

    #[test]
    fn routing_follows_state_and_setup_flag() {
        let mut profile =
            Profile::default_for(&Identity::new("u-1", "agent@factory.test"), Utc::now());
        assert_eq!(
            RoutingTarget::resolve(SessionState::Unauthenticated, None),
            RoutingTarget::Login
        );
        assert_eq!(
            RoutingTarget::resolve(SessionState::Authenticating, None),
            RoutingTarget::Login
        );
        assert_eq!(
            RoutingTarget::resolve(SessionState::for_profile(&profile), Some(&profile)),
            RoutingTarget::Setup
        );
        profile.needs_setup = false;
        profile.role = Role::Supervisor;
        assert_eq!(
            RoutingTarget::resolve(SessionState::for_profile(&profile), Some(&profile)),
            RoutingTarget::Dashboard(Role::Supervisor)
        );
    }
}
