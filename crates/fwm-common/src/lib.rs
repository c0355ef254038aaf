//! ---
//! fwm_section: "01-core-functionality"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Shared primitives and utilities for the client runtime."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Core shared primitives for the FWM client workspace.
//! This crate exposes configuration loading, tracing setup and the local
//! key/value store that backs the session cache and the auth token.

pub mod config;
pub mod logging;
pub mod store;

pub use config::{
    AppConfig, BackendConfig, DashboardConfig, LoadedAppConfig, LoggingConfig, SessionSettings,
};
pub use logging::{init_tracing, LogFormat};
pub use store::{FileStore, LocalStore, LocalStoreExt, MemoryStore, StoreError};
