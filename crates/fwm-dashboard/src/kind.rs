//! ---
//! fwm_section: "12-dashboard-presentation"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Role-scoped dashboard data, polling and actions."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use fwm_session::Role;
use serde::Serialize;
use strum::{AsRefStr, Display};

/// Dashboard flavour shown to each role.
///
/// The mapping from [`Role`] is exhaustive, so a new role cannot fall
/// through to some default dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DashboardKind {
    Agent,
    TeamLead,
    Supervisor,
    DeputyDirector,
    Director,
}

impl DashboardKind {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Agent => DashboardKind::Agent,
            Role::TeamLead => DashboardKind::TeamLead,
            Role::Supervisor => DashboardKind::Supervisor,
            Role::DeputyDirector => DashboardKind::DeputyDirector,
            Role::Director => DashboardKind::Director,
        }
    }

    /// Remote procedure returning this dashboard's aggregates.
    pub fn endpoint(self) -> &'static str {
        match self {
            DashboardKind::Agent => "get-dashboard-data",
            DashboardKind::TeamLead => "get-team-data",
            DashboardKind::Supervisor => "get-supervisor-dashboard",
            DashboardKind::DeputyDirector => "get-deputy-director-dashboard",
            DashboardKind::Director => "get-director-dashboard",
        }
    }

    pub fn route(self) -> &'static str {
        match self {
            DashboardKind::Agent => "/dashboard/agent",
            DashboardKind::TeamLead => "/dashboard/team-lead",
            DashboardKind::Supervisor => "/dashboard/supervisor",
            DashboardKind::DeputyDirector => "/dashboard/deputy-director",
            DashboardKind::Director => "/dashboard/director",
        }
    }

    pub fn role(self) -> Role {
        match self {
            DashboardKind::Agent => Role::Agent,
            DashboardKind::TeamLead => Role::TeamLead,
            DashboardKind::Supervisor => Role::Supervisor,
            DashboardKind::DeputyDirector => Role::DeputyDirector,
            DashboardKind::Director => Role::Director,
        }
    }
}

impl From<Role> for DashboardKind {
    fn from(role: Role) -> Self {
        DashboardKind::for_role(role)
    }
}
