//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "binary"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Operator CLI for sessions, profiles and dashboards."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use tokio::runtime::Runtime;

mod auth;
mod context;
mod dashboard;
mod demo;
mod profile;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Factory workforce client: session, profile and dashboard tooling",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
    #[command(flatten)]
    global: GlobalOptions,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalOptions {
    /// Configuration file (defaults to fwm.toml, then configs/fwm.toml).
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Run against a seeded in-process backend instead of the configured one.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub demo: bool,

    /// Sign in with these credentials when no stored session can be restored.
    #[arg(long, env = "FWM_EMAIL", global = true)]
    pub email: Option<String>,

    #[arg(long, env = "FWM_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in and store the session locally.
    Login(auth::LoginCommand),
    /// Revoke the session and clear user data from local storage.
    Logout,
    /// Show the signed-in identity, role and permissions.
    Whoami(auth::WhoamiCommand),
    #[command(subcommand, about = "Profile maintenance")]
    Profile(profile::ProfileCommand),
    /// Print the role dashboard, optionally polling until interrupted.
    Dashboard(dashboard::DashboardCommand),
    #[command(subcommand, about = "Dashboard actions")]
    Action(dashboard::ActionCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("fwmctl {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let Some(command) = cli.command else {
        anyhow::bail!("no command given; run `fwmctl --help` for usage");
    };

    let runtime = Runtime::new()?;
    runtime.block_on(async move {
        let ctx = context::ClientContext::build(&cli.global)?;
        let outcome = match command {
            Commands::Login(cmd) => auth::login(&ctx, cmd).await,
            Commands::Logout => auth::logout(&ctx).await,
            Commands::Whoami(cmd) => auth::whoami(&ctx, cmd).await,
            Commands::Profile(cmd) => profile::run(&ctx, cmd).await,
            Commands::Dashboard(cmd) => dashboard::show(&ctx, cmd).await,
            Commands::Action(cmd) => dashboard::act(&ctx, cmd).await,
        };
        ctx.session.shutdown().await;
        outcome
    })
}
