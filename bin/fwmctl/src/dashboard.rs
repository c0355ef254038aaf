//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "binary"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Operator CLI for sessions, profiles and dashboards."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Subcommand};
use fwm_dashboard::{DashboardAction, DashboardController, DashboardSnapshot, Severity};
use serde_json::Value;
use tokio::sync::watch;

use crate::context::ClientContext;

#[derive(Debug, Args)]
pub struct DashboardCommand {
    /// Keep polling and reprint whenever the data changes (Ctrl-C to stop).
    #[arg(long, action = ArgAction::SetTrue)]
    watch: bool,
    /// Poll interval in seconds; defaults to the configured value.
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,
    /// Emit JSON instead of text.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ActionCommand {
    /// Clock in for the current shift.
    ClockIn,
    /// Clock out of the current shift.
    ClockOut,
    /// Report a production issue.
    ReportIssue {
        #[arg(long)]
        line: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value_t = Severity::Medium)]
        severity: Severity,
    },
    /// Start a production run on a line.
    StartRun {
        #[arg(long)]
        line: String,
        #[arg(long)]
        product: String,
        #[arg(long = "target", value_name = "QUANTITY")]
        target_quantity: u32,
    },
    /// Assign production lines to a user (Team Lead and above).
    AssignLines {
        #[arg(long = "user", value_name = "USER_ID")]
        user_id: String,
        #[arg(long, value_delimiter = ',', required = true)]
        lines: Vec<String>,
    },
}

impl From<ActionCommand> for DashboardAction {
    fn from(command: ActionCommand) -> Self {
        match command {
            ActionCommand::ClockIn => DashboardAction::ClockIn,
            ActionCommand::ClockOut => DashboardAction::ClockOut,
            ActionCommand::ReportIssue {
                line,
                description,
                severity,
            } => DashboardAction::ReportIssue {
                line,
                description,
                severity,
            },
            ActionCommand::StartRun {
                line,
                product,
                target_quantity,
            } => DashboardAction::StartProductionRun {
                line,
                product,
                target_quantity,
            },
            ActionCommand::AssignLines { user_id, lines } => {
                DashboardAction::AssignLines { user_id, lines }
            }
        }
    }
}

pub async fn show(ctx: &ClientContext, cmd: DashboardCommand) -> Result<()> {
    ctx.require_profile().await?;
    let controller = Arc::new(DashboardController::new(
        ctx.session.clone(),
        &ctx.config.dashboard,
    ));
    controller
        .refresh()
        .await
        .context("failed to load dashboard")?;
    print_snapshot(&controller.snapshot(), cmd.json)?;
    if !cmd.watch {
        return Ok(());
    }

    let interval = cmd
        .interval
        .map(Duration::from_secs)
        .unwrap_or(ctx.config.dashboard.poll_interval);
    let (stop, shutdown) = watch::channel(false);
    let poller = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run_polling(interval, shutdown).await })
    };

    let mut printed = controller.snapshot().revision;
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = controller.snapshot();
                if snapshot.revision != printed {
                    printed = snapshot.revision;
                    print_snapshot(&snapshot, cmd.json)?;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    let _ = stop.send(true);
    poller.await.context("dashboard poller failed")?;
    Ok(())
}

pub async fn act(ctx: &ClientContext, command: ActionCommand) -> Result<()> {
    ctx.require_profile().await?;
    let controller = DashboardController::new(ctx.session.clone(), &ctx.config.dashboard);
    let action = DashboardAction::from(command);
    let name = action.name();
    let result = controller.perform(action).await?;
    println!("{name}: ok");
    if !result.is_null() {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

fn print_snapshot(snapshot: &DashboardSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }
    let title = snapshot
        .kind
        .map(|kind| kind.role().label())
        .unwrap_or("No");
    println!("== {title} dashboard (revision {}) ==", snapshot.revision);
    for widget in &snapshot.widgets {
        println!("{:<24} {}", widget.name, render_value(&widget.data));
    }
    if !snapshot.notifications.is_empty() {
        println!("-- notifications --");
        for notification in &snapshot.notifications {
            let message = notification["message"]
                .as_str()
                .map(str::to_owned)
                .unwrap_or_else(|| notification.to_string());
            println!("* {message}");
        }
    }
    Ok(())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
