//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Session and authorization state for the workforce dashboard.
//!
//! [`SessionContext`] owns the signed-in identity and profile, keeps the
//! local cache in step with the backend and publishes lifecycle events.
//! Role comparisons and permission predicates live in [`role`] and
//! [`permissions`] and can be used without a context.

pub mod cache;
pub mod error;
pub mod events;
pub mod messages;
pub mod metrics;
pub mod navigator;
pub mod permissions;
pub mod profile;
pub mod role;
pub mod session;
pub mod state;

pub use cache::{ProfileCache, USER_EMAIL_KEY, USER_ID_KEY, USER_PROFILE_KEY, USER_ROLE_KEY};
pub use error::{LoginFailure, LoginFailureReason, SessionError};
pub use events::{DispatchReport, EventKind, EventRegistry, Listener, ListenerId, SessionEvent};
pub use messages::Locale;
pub use metrics::SessionMetrics;
pub use navigator::{Navigator, RecordingNavigator};
pub use profile::{Profile, ProfileUpdate, PROFILES_TABLE};
pub use role::Role;
pub use session::{SessionBuilder, SessionConfig, SessionContext, NOTIFICATIONS_TABLE};
pub use state::{RoutingTarget, SessionState};
