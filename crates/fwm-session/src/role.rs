//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Five-tier organisational hierarchy, lowest first.
///
/// Variant order is the hierarchy order; `Ord` follows it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Agent,
    TeamLead,
    Supervisor,
    DeputyDirector,
    Director,
}

impl Role {
    /// Position in the hierarchy, `1` for the lowest tier.
    pub fn level(self) -> u8 {
        match self {
            Role::Agent => 1,
            Role::TeamLead => 2,
            Role::Supervisor => 3,
            Role::DeputyDirector => 4,
            Role::Director => 5,
        }
    }

    /// Tier assigned to freshly created profiles.
    pub fn lowest() -> Self {
        Role::Agent
    }

    /// Whether this tier satisfies a requirement of `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self.level() >= required.level()
    }

    /// Whether this tier sits strictly above `other`.
    pub fn outranks(self, other: Role) -> bool {
        self.level() > other.level()
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Role::Agent => "Agent",
            Role::TeamLead => "Team Lead",
            Role::Supervisor => "Supervisor",
            Role::DeputyDirector => "Deputy Director",
            Role::Director => "Director",
        }
    }

    pub fn all() -> impl Iterator<Item = Role> {
        Role::iter()
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::lowest()
    }
}
