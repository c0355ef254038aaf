//! ---
//! fwm_section: "12-dashboard-presentation"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Role-scoped dashboard data, polling and actions."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! User actions wired to remote procedures.

use fwm_session::Role;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum::{AsRefStr, Display, EnumString};

/// Severity attached to an issue report.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardAction {
    ClockIn,
    ClockOut,
    ReportIssue {
        line: String,
        description: String,
        severity: Severity,
    },
    StartProductionRun {
        line: String,
        product: String,
        target_quantity: u32,
    },
    AssignLines {
        user_id: String,
        lines: Vec<String>,
    },
}

impl DashboardAction {
    pub fn endpoint(&self) -> &'static str {
        match self {
            DashboardAction::ClockIn | DashboardAction::ClockOut => "clock-in-out",
            DashboardAction::ReportIssue { .. } => "report-issue",
            DashboardAction::StartProductionRun { .. } => "start-production-run",
            DashboardAction::AssignLines { .. } => "assign-lines",
        }
    }

    /// Lowest tier allowed to trigger the action.
    pub fn required_role(&self) -> Role {
        match self {
            DashboardAction::AssignLines { .. } => Role::TeamLead,
            _ => Role::Agent,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DashboardAction::ClockIn => "clock_in",
            DashboardAction::ClockOut => "clock_out",
            DashboardAction::ReportIssue { .. } => "report_issue",
            DashboardAction::StartProductionRun { .. } => "start_production_run",
            DashboardAction::AssignLines { .. } => "assign_lines",
        }
    }

    pub fn params(&self) -> Value {
        match self {
            DashboardAction::ClockIn => json!({ "action": "clock_in" }),
            DashboardAction::ClockOut => json!({ "action": "clock_out" }),
            DashboardAction::ReportIssue {
                line,
                description,
                severity,
            } => json!({
                "line": line,
                "description": description,
                "severity": severity,
            }),
            DashboardAction::StartProductionRun {
                line,
                product,
                target_quantity,
            } => json!({
                "line": line,
                "product": product,
                "target_quantity": target_quantity,
            }),
            DashboardAction::AssignLines { user_id, lines } => json!({
                "user_id": user_id,
                "lines": lines,
            }),
        }
    }
}
