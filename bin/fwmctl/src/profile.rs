//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "binary"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Operator CLI for sessions, profiles and dashboards."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use fwm_session::ProfileUpdate;

use crate::auth::render_profile;
use crate::context::ClientContext;

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Print the signed-in profile.
    Show,
    /// Update profile fields. Completing department and line ends setup.
    Update(UpdateArgs),
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[arg(long = "full-name", value_name = "NAME")]
    full_name: Option<String>,
    #[arg(long, value_name = "DEPARTMENT")]
    department: Option<String>,
    #[arg(long, value_name = "SHIFT")]
    shift: Option<String>,
    #[arg(long = "production-line", value_name = "LINE")]
    production_line: Option<String>,
}

pub async fn run(ctx: &ClientContext, command: ProfileCommand) -> Result<()> {
    let current = ctx.require_profile().await?;
    match command {
        ProfileCommand::Show => render_profile(&current),
        ProfileCommand::Update(args) => {
            let mut update = ProfileUpdate {
                full_name: args.full_name,
                department: args.department,
                shift: args.shift,
                production_line: args.production_line,
                ..ProfileUpdate::default()
            };
            if update.is_empty() {
                return Err(anyhow!("nothing to update; pass at least one field"));
            }
            if current.needs_setup {
                let department = update.department.as_ref().or(current.department.as_ref());
                let line = update
                    .production_line
                    .as_ref()
                    .or(current.production_line.as_ref());
                if department.is_some() && line.is_some() {
                    update.needs_setup = Some(false);
                }
            }
            let profile = ctx.session.update_profile(update).await?;
            println!("Profile updated");
            render_profile(&profile);
        }
    }
    Ok(())
}
