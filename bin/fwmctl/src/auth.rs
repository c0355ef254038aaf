//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "binary"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Operator CLI for sessions, profiles and dashboards."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args};
use fwm_session::{Profile, Role, RoutingTarget};
use serde_json::json;

use crate::context::ClientContext;

/// Credentials come from the global `--email` / `--password` options; the
/// password is read from stdin when omitted.
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Register the account before signing in.
    #[arg(long, action = ArgAction::SetTrue)]
    register: bool,
}

#[derive(Debug, Args)]
pub struct WhoamiCommand {
    /// Emit JSON instead of text.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

pub async fn login(ctx: &ClientContext, cmd: LoginCommand) -> Result<()> {
    let (email, password) = ctx.credentials();
    let email = email.ok_or_else(|| anyhow!("an email is required (--email)"))?;
    let password = match password {
        Some(password) => password.to_owned(),
        None => prompt_password(email)?,
    };

    ctx.session.initialize().await?;
    if cmd.register {
        let identity = ctx.session.register(email, &password).await?;
        println!("Registered {}", identity.email);
    }
    let profile = ctx.session.login(email, &password).await?;
    println!(
        "Signed in as {} ({})",
        profile.display_name(),
        profile.role.label()
    );
    println!("Next: {}", describe_route(ctx.session.routing_target()));
    Ok(())
}

pub async fn logout(ctx: &ClientContext) -> Result<()> {
    ctx.session.initialize().await?;
    let who = ctx.session.profile().map(|profile| profile.email);
    ctx.session.logout().await;
    match who {
        Some(email) => println!("Signed out {email}"),
        None => println!("No active session; local data cleared"),
    }
    Ok(())
}

pub async fn whoami(ctx: &ClientContext, cmd: WhoamiCommand) -> Result<()> {
    let profile = ctx.require_profile().await?;
    let permissions: Vec<&str> = Role::all()
        .filter(|role| ctx.session.has_permission(*role))
        .map(Role::label)
        .collect();
    if cmd.json {
        let out = json!({
            "profile": profile,
            "state": ctx.session.state(),
            "acts_as": permissions,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        render_profile(&profile);
        println!("Acts as:     {}", permissions.join(", "));
        println!("Next:        {}", describe_route(ctx.session.routing_target()));
    }
    Ok(())
}

pub fn render_profile(profile: &Profile) {
    println!("Name:        {}", profile.display_name());
    println!("Email:       {}", profile.email);
    println!("Role:        {}", profile.role.label());
    println!(
        "Department:  {}",
        profile.department.as_deref().unwrap_or("-")
    );
    println!("Shift:       {}", profile.shift.as_deref().unwrap_or("-"));
    println!(
        "Line:        {}",
        profile.production_line.as_deref().unwrap_or("-")
    );
    if profile.needs_setup {
        println!("Setup:       pending");
    }
}

fn describe_route(target: RoutingTarget) -> String {
    match target {
        RoutingTarget::Login => "sign in required".to_owned(),
        RoutingTarget::Setup => "complete profile setup (`fwmctl profile update`)".to_owned(),
        RoutingTarget::Dashboard(role) => format!("{} dashboard", role.label()),
    }
}

fn prompt_password(email: &str) -> Result<String> {
    eprint!("Password for {email}: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        return Err(anyhow!("a password is required"));
    }
    Ok(password)
}
