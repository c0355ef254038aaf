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
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use fwm_common::{init_tracing, AppConfig, FileStore, LocalStore, MemoryStore};
use fwm_remote::{HttpRemoteClient, RemoteClient};
use fwm_session::{Profile, RecordingNavigator, SessionConfig, SessionContext, SessionMetrics};
use prometheus::Registry;
use tracing::debug;

use crate::demo;
use crate::GlobalOptions;

/// Everything a command needs: configuration and a wired session.
pub struct ClientContext {
    pub config: AppConfig,
    pub session: SessionContext,
    pub demo: bool,
    email: Option<String>,
    password: Option<String>,
}

impl ClientContext {
    pub fn build(options: &GlobalOptions) -> Result<Self> {
        let config = load_config(options)?;
        init_tracing("fwmctl", &config.logging)?;

        let (remote, store): (Arc<dyn RemoteClient>, Arc<dyn LocalStore>) = if options.demo {
            (demo::seeded_backend(), Arc::new(MemoryStore::new()))
        } else {
            let store: Arc<dyn LocalStore> = Arc::new(
                FileStore::open(&config.session.storage_path).with_context(|| {
                    format!(
                        "unable to open session store {}",
                        config.session.storage_path.display()
                    )
                })?,
            );
            let remote = HttpRemoteClient::new(&config.backend, store.clone())
                .context("invalid backend configuration")?;
            (Arc::new(remote), store)
        };

        let session_config = SessionConfig::from_settings(&config.session);
        let navigator = Arc::new(RecordingNavigator::new(&session_config.login_route));
        let metrics = SessionMetrics::new(Arc::new(Registry::new()))?;
        let session = SessionContext::builder(remote, store)
            .navigator(navigator)
            .config(session_config)
            .metrics(metrics)
            .build();

        Ok(Self {
            config,
            session,
            demo: options.demo,
            email: options.email.clone(),
            password: options.password.clone(),
        })
    }

    /// Restore the stored session, falling back to the global credentials.
    pub async fn require_profile(&self) -> Result<Profile> {
        let state = self.session.initialize().await?;
        if state.is_authenticated() {
            if let Some(profile) = self.session.profile() {
                return Ok(profile);
            }
        }
        let (Some(email), Some(password)) = (&self.email, &self.password) else {
            return Err(anyhow!(
                "not signed in; run `fwmctl login` or pass --email/--password"
            ));
        };
        debug!(email = %email, "no restorable session; signing in");
        Ok(self.session.login(email, password).await?)
    }

    /// Credentials supplied on the command line, if any.
    pub fn credentials(&self) -> (Option<&str>, Option<&str>) {
        (self.email.as_deref(), self.password.as_deref())
    }
}

fn load_config(options: &GlobalOptions) -> Result<AppConfig> {
    let mut candidates = Vec::new();
    if let Some(path) = &options.config {
        if !path.exists() {
            return Err(anyhow!("configuration file {} not found", path.display()));
        }
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("fwm.toml"));
    candidates.push(PathBuf::from("configs/fwm.toml"));
    AppConfig::load(&candidates)
}
