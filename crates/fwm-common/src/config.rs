//! ---
//! fwm_section: "01-core-functionality"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Shared primitives and utilities for the client runtime."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::{debug, warn};
use url::Url;

use crate::logging::LogFormat;

fn default_backend_url() -> String {
    "http://127.0.0.1:54321".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_realtime_path() -> String {
    "/realtime/v1/websocket".to_owned()
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_login_route() -> String {
    "/login".to_owned()
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_preserved_keys() -> Vec<String> {
    vec!["language".to_owned(), "theme".to_owned()]
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("target/fwm/session.json")
}

fn default_locale() -> String {
    "en".to_owned()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_notification_capacity() -> usize {
    50
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for the FWM client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "FWM_CONFIG";
    pub const ENV_BACKEND_URL: &str = "FWM_BACKEND_URL";
    pub const ENV_BACKEND_KEY: &str = "FWM_BACKEND_KEY";

    /// Load configuration from disk, respecting the `FWM_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// Unlike a daemon, the client can run without any file: when no
    /// candidate exists the defaults are used and only the environment
    /// overrides apply.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let mut config = Self::from_path(&path)?;
                config.apply_env_overrides();
                config.validate()?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let mut config = Self::from_path(&path)?;
                config.apply_env_overrides();
                config.validate()?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!(
            inspected = %candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            "no configuration file found; using defaults"
        );
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(LoadedAppConfig {
            config,
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Apply `FWM_BACKEND_URL` / `FWM_BACKEND_KEY` when they are set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(Self::ENV_BACKEND_URL) {
            if !url.trim().is_empty() {
                self.backend.url = url.trim().to_owned();
            }
        }
        if let Ok(key) = std::env::var(Self::ENV_BACKEND_KEY) {
            if !key.trim().is_empty() {
                self.backend.anon_key = key.trim().to_owned();
            }
        }
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;
        self.session.validate()?;
        self.dashboard.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Location and credentials of the hosted backend.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
    #[serde(default = "default_realtime_path")]
    pub realtime_path: String,
    #[serde(default = "default_heartbeat_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub heartbeat_interval: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            anon_key: String::new(),
            request_timeout: default_request_timeout(),
            realtime_path: default_realtime_path(),
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

impl BackendConfig {
    /// Parse the configured base URL.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.url).with_context(|| format!("invalid backend url '{}'", self.url))
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "backend url must use http or https, got '{}'",
                url.scheme()
            ));
        }
        if !self.realtime_path.starts_with('/') {
            return Err(anyhow!("backend realtime_path must start with '/'"));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("backend request_timeout must be non-zero"));
        }
        if self.anon_key.is_empty() {
            warn!("backend anon_key is empty; requests will be sent without an api key");
        }
        Ok(())
    }
}

/// Session lifecycle settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_login_route")]
    pub login_route: String,
    #[serde(default = "default_refresh_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub refresh_interval: Duration,
    #[serde(default = "default_preserved_keys")]
    pub preserved_keys: Vec<String>,
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_locale")]
    pub locale: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            login_route: default_login_route(),
            refresh_interval: default_refresh_interval(),
            preserved_keys: default_preserved_keys(),
            storage_path: default_storage_path(),
            locale: default_locale(),
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval.is_zero() {
            return Err(anyhow!("session refresh_interval must be non-zero"));
        }
        if self.login_route.trim().is_empty() {
            return Err(anyhow!("session login_route cannot be empty"));
        }
        Ok(())
    }
}

/// Dashboard polling settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub poll_interval: Duration,
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(anyhow!("dashboard poll_interval must be non-zero"));
        }
        if self.notification_capacity == 0 {
            return Err(anyhow!("dashboard notification_capacity must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: AppConfig = r#"
            [backend]
            url = "https://factory.example.com"
            anon_key = "anon"
        "#
        .parse()
        .unwrap();
        assert_eq!(config.backend.url, "https://factory.example.com");
        assert_eq!(config.session.login_route, "/login");
        assert_eq!(config.session.preserved_keys, vec!["language", "theme"]);
        assert_eq!(config.dashboard.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn durations_are_read_as_seconds() {
        let config: AppConfig = r#"
            [session]
            refresh_interval = 120
            [dashboard]
            poll_interval = 5
        "#
        .parse()
        .unwrap();
        assert_eq!(config.session.refresh_interval, Duration::from_secs(120));
        assert_eq!(config.dashboard.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn rejects_non_http_backend() {
        let err = r#"
            [backend]
            url = "ftp://factory.example.com"
        "#
        .parse::<AppConfig>()
        .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        assert!(r#"
            [dashboard]
            poll_interval = 0
        "#
        .parse::<AppConfig>()
        .is_err());
    }

    #[test]
    fn loads_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fwm.toml");
        fs::write(&path, "[session]\nlogin_route = \"/signin\"\n").unwrap();
        let missing = dir.path().join("missing.toml");

        let loaded = AppConfig::load_with_source(&[missing, path.clone()]).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.session.login_route, "/signin");
    }

    #[test]
    fn sample_config_parses() {
        let config: AppConfig = include_str!("../../../configs/fwm.example.toml")
            .parse()
            .unwrap();
        assert_eq!(config.backend.url, "https://factory-backend.example.com");
        assert_eq!(config.session.refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.dashboard.notification_capacity, 50);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }
}
