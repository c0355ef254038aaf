//! ---
//! fwm_section: "12-dashboard-presentation"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Role-scoped dashboard data, polling and actions."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use fwm_remote::RemoteError;
use fwm_session::Role;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("no authenticated session")]
    NotAuthenticated,
    /// The profile is incomplete; the setup flow must run first.
    #[error("profile setup must be completed before the dashboard can load")]
    SetupRequired,
    #[error("{action} requires the {} role or above", required.label())]
    Forbidden { action: &'static str, required: Role },
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("dashboard payload from {endpoint} is not an object")]
    InvalidPayload { endpoint: &'static str },
}
