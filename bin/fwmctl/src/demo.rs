//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "binary"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Operator CLI for sessions, profiles and dashboards."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Seeded in-process backend behind `--demo`.
//!
//! One account per role, password [`DEMO_PASSWORD`], and a small shop floor
//! whose state the action procedures mutate and the dashboard procedures
//! report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use fwm_remote::{Identity, InMemoryBackend, RemoteError};
use fwm_session::{Role, PROFILES_TABLE};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const DEMO_PASSWORD: &str = "demo-pass";

const ACCOUNTS: [(&str, &str, Role); 5] = [
    ("agent@demo.fwm", "Ana Agent", Role::Agent),
    ("lead@demo.fwm", "Leo Lead", Role::TeamLead),
    ("supervisor@demo.fwm", "Sam Supervisor", Role::Supervisor),
    ("deputy@demo.fwm", "Dee Deputy", Role::DeputyDirector),
    ("director@demo.fwm", "Dora Director", Role::Director),
];

#[derive(Debug, Default)]
struct ShopFloor {
    clocked_in: BTreeSet<String>,
    issues: Vec<Value>,
    runs: BTreeMap<String, Value>,
    assignments: BTreeMap<String, Vec<String>>,
}

type Floor = Arc<Mutex<ShopFloor>>;

pub fn seeded_backend() -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    let now = Utc::now();
    for (email, name, role) in ACCOUNTS {
        let identity = backend.register_user(email, DEMO_PASSWORD);
        backend.seed_row(
            PROFILES_TABLE,
            json!({
                "id": identity.id,
                "email": email,
                "full_name": name,
                "role": role,
                "department": "assembly",
                "shift": "day",
                "production_line": "L1",
                "needs_setup": false,
                "supervised_departments": ["assembly", "packaging"],
                "managed_departments": ["assembly"],
                "created_at": now,
                "updated_at": now,
            }),
        );
    }

    let floor: Floor = Arc::new(Mutex::new(ShopFloor::default()));
    register_dashboards(&backend, &floor);
    register_actions(&backend, &floor);
    backend
}

fn caller_id(caller: Option<&Identity>) -> Result<String, RemoteError> {
    caller
        .map(|identity| identity.id.clone())
        .ok_or_else(|| RemoteError::rejected(401, None))
}

fn text(params: &Value, field: &str) -> Result<String, RemoteError> {
    params[field]
        .as_str()
        .filter(|value| !value.trim().is_empty())
        .map(str::to_owned)
        .ok_or_else(|| RemoteError::rejected(400, Some(format!("missing field {field}"))))
}

fn register_dashboards(backend: &InMemoryBackend, floor: &Floor) {
    let state = floor.clone();
    backend.register_procedure("get-dashboard-data", move |caller, _| {
        let id = caller_id(caller)?;
        let floor = state.lock();
        Ok(json!({
            "clocked_in": floor.clocked_in.contains(&id),
            "assigned_lines": floor.assignments.get(&id).cloned().unwrap_or_default(),
            "my_open_issues": floor.issues.iter().filter(|issue| issue["reported_by"] == id.as_str()).count(),
        }))
    });

    let state = floor.clone();
    backend.register_procedure("get-team-data", move |caller, _| {
        caller_id(caller)?;
        let floor = state.lock();
        Ok(json!({
            "team_present": floor.clocked_in.len(),
            "line_assignments": floor.assignments,
            "open_issues": floor.issues.len(),
        }))
    });

    for endpoint in [
        "get-supervisor-dashboard",
        "get-deputy-director-dashboard",
        "get-director-dashboard",
    ] {
        let state = floor.clone();
        backend.register_procedure(endpoint, move |caller, _| {
            caller_id(caller)?;
            let floor = state.lock();
            let critical = floor
                .issues
                .iter()
                .filter(|issue| issue["severity"] == "critical")
                .count();
            Ok(json!({
                "workforce_present": floor.clocked_in.len(),
                "active_runs": floor.runs.len(),
                "planned_output": floor.runs.values().filter_map(|run| run["target_quantity"].as_u64()).sum::<u64>(),
                "open_issues": floor.issues.len(),
                "critical_issues": critical,
            }))
        });
    }
}

fn register_actions(backend: &InMemoryBackend, floor: &Floor) {
    let state = floor.clone();
    backend.register_procedure("clock-in-out", move |caller, params| {
        let id = caller_id(caller)?;
        let action = text(&params, "action")?;
        let mut floor = state.lock();
        let changed = match action.as_str() {
            "clock_in" => floor.clocked_in.insert(id),
            "clock_out" => floor.clocked_in.remove(&id),
            other => {
                return Err(RemoteError::rejected(
                    400,
                    Some(format!("unknown action {other}")),
                ))
            }
        };
        if !changed {
            let message = if action == "clock_in" {
                "already clocked in"
            } else {
                "not clocked in"
            };
            return Err(RemoteError::Procedure {
                name: "clock-in-out".to_owned(),
                message: message.to_owned(),
            });
        }
        Ok(json!({ "action": action, "at": Utc::now() }))
    });

    let state = floor.clone();
    backend.register_procedure("report-issue", move |caller, params| {
        let id = caller_id(caller)?;
        let line = text(&params, "line")?;
        let description = text(&params, "description")?;
        let mut floor = state.lock();
        let issue = json!({
            "id": floor.issues.len() + 1,
            "line": line,
            "description": description,
            "severity": params["severity"],
            "reported_by": id,
            "reported_at": Utc::now(),
        });
        floor.issues.push(issue.clone());
        Ok(issue)
    });

    let state = floor.clone();
    backend.register_procedure("start-production-run", move |caller, params| {
        caller_id(caller)?;
        let line = text(&params, "line")?;
        let mut floor = state.lock();
        if floor.runs.contains_key(&line) {
            return Err(RemoteError::Procedure {
                name: "start-production-run".to_owned(),
                message: format!("line {line} is already running"),
            });
        }
        let run = json!({
            "line": line,
            "product": text(&params, "product")?,
            "target_quantity": params["target_quantity"],
            "started_at": Utc::now(),
        });
        floor.runs.insert(line, run.clone());
        Ok(run)
    });

    let state = floor.clone();
    backend.register_procedure("assign-lines", move |caller, params| {
        caller_id(caller)?;
        let user = text(&params, "user_id")?;
        let lines: Vec<String> = params["lines"]
            .as_array()
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|line| line.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();
        if lines.is_empty() {
            return Err(RemoteError::rejected(400, Some("no lines given".to_owned())));
        }
        state.lock().assignments.insert(user.clone(), lines.clone());
        Ok(json!({ "user_id": user, "lines": lines }))
    });
}
