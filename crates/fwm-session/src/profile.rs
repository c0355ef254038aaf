//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use fwm_remote::{Identity, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SessionError;
use crate::role::Role;

/// Table holding one profile row per identity.
pub const PROFILES_TABLE: &str = "profiles";

/// Per-identity organisational record. The remote copy is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub shift: Option<String>,
    #[serde(default)]
    pub production_line: Option<String>,
    #[serde(default)]
    pub needs_setup: bool,
    /// Departments overseen by a Supervisor.
    #[serde(default)]
    pub supervised_departments: Vec<String>,
    /// Departments run by a Team Lead.
    #[serde(default)]
    pub managed_departments: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Profile synthesized for an identity without a stored row: lowest tier,
    /// setup pending.
    pub fn default_for(identity: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            full_name: None,
            role: Role::lowest(),
            department: None,
            shift: None,
            production_line: None,
            needs_setup: true,
            supervised_departments: Vec::new(),
            managed_departments: Vec::new(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn from_row(row: Value) -> Result<Self, SessionError> {
        serde_json::from_value(row).map_err(|err| SessionError::InvalidProfile(err.to_string()))
    }

    pub fn to_row(&self) -> Result<Value, SessionError> {
        serde_json::to_value(self).map_err(|err| SessionError::InvalidProfile(err.to_string()))
    }

    /// Name shown in greetings; falls back to the email.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Partial profile update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_setup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervised_departments: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_departments: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ProfileUpdate::default()
    }

    /// Column patch sent to the backend, stamped with `updated_at`.
    pub fn to_patch(&self, now: DateTime<Utc>) -> Result<Value, SessionError> {
        let mut patch = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(err) => return Err(SessionError::InvalidProfile(err.to_string())),
        };
        patch.insert(
            "updated_at".to_owned(),
            serde_json::to_value(now).map_err(|err| SessionError::InvalidProfile(err.to_string()))?,
        );
        Ok(Value::Object(patch))
    }
}
