//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "binary"
//! fwm_type: "test"
//! fwm_scope: "code"
//! fwm_description: "Operator CLI for sessions, profiles and dashboards."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use assert_cmd::Command;
use tempfile::TempDir;

fn fwmctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fwmctl").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("FWM_CONFIG")
        .env_remove("FWM_EMAIL")
        .env_remove("FWM_PASSWORD")
        .env("FWM_LOG", "warn");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn prints_version() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(fwmctl(&dir).arg("-V"));
    assert!(out.starts_with("fwmctl "));
}

#[test]
fn missing_command_fails() {
    let dir = TempDir::new().unwrap();
    fwmctl(&dir).assert().failure();
}

#[test]
fn demo_whoami_reports_role_and_permissions() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(fwmctl(&dir).args([
        "--demo",
        "--email",
        "lead@demo.fwm",
        "--password",
        "demo-pass",
        "whoami",
    ]));
    assert!(out.contains("Role:        Team Lead"), "{out}");
    assert!(out.contains("Acts as:     Agent, Team Lead"), "{out}");
    assert!(out.contains("Team Lead dashboard"), "{out}");
}

#[test]
fn demo_whoami_json_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(fwmctl(&dir).args([
        "--demo",
        "--email",
        "director@demo.fwm",
        "--password",
        "demo-pass",
        "whoami",
        "--json",
    ]));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["profile"]["role"], "director");
    assert_eq!(value["acts_as"].as_array().unwrap().len(), 5);
}

#[test]
fn demo_dashboard_prints_widgets() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(fwmctl(&dir).args([
        "--demo",
        "--email",
        "agent@demo.fwm",
        "--password",
        "demo-pass",
        "dashboard",
    ]));
    assert!(out.contains("== Agent dashboard"), "{out}");
    assert!(out.contains("clocked_in"), "{out}");
}

#[test]
fn demo_agent_cannot_assign_lines() {
    let dir = TempDir::new().unwrap();
    let output = fwmctl(&dir)
        .args([
            "--demo",
            "--email",
            "agent@demo.fwm",
            "--password",
            "demo-pass",
            "action",
            "assign-lines",
            "--user",
            "someone",
            "--lines",
            "L1,L2",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("requires the Team Lead role"), "{stderr}");
}

#[test]
fn demo_rejects_wrong_password() {
    let dir = TempDir::new().unwrap();
    fwmctl(&dir)
        .args([
            "--demo",
            "--email",
            "agent@demo.fwm",
            "--password",
            "nope",
            "whoami",
        ])
        .assert()
        .failure();
}
