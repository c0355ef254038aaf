//! ---
//! fwm_section: "03-logging"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Structured logging adapters and sinks."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers shared by the session, remote and dashboard crates.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Operation name (`login`, `load_profile`, `dashboard.refresh`, ...).
    pub operation: Option<&'a str>,
    /// Identity the operation runs on behalf of.
    pub user_id: Option<&'a str>,
    /// Role label of the caller.
    pub role: Option<&'a str>,
    /// Remote endpoint or table involved.
    pub endpoint: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context scoped to a named operation.
    pub fn operation(operation: &'a str) -> Self {
        Self {
            operation: Some(operation),
            ..Self::default()
        }
    }

    /// Attach an identity.
    pub fn with_user(mut self, user_id: &'a str) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach a role label.
    pub fn with_role(mut self, role: &'a str) -> Self {
        self.role = Some(role);
        self
    }

    /// Attach a remote endpoint or table name.
    pub fn with_endpoint(mut self, endpoint: &'a str) -> Self {
        self.endpoint = Some(endpoint);
        self
    }
}

/// Outcome attached to operation lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl OperationOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            OperationOutcome::Success => "success",
            OperationOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized operation event. Success logs at INFO, faults at ERROR.
pub fn log_operation_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: OperationOutcome,
) {
    let ctx = context.copied().unwrap_or_default();
    match outcome {
        OperationOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            operation = ctx.operation.unwrap_or(""),
            user_id = ctx.user_id.unwrap_or(""),
            role = ctx.role.unwrap_or(""),
            endpoint = ctx.endpoint.unwrap_or(""),
            message = %message
        ),
        OperationOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            operation = ctx.operation.unwrap_or(""),
            user_id = ctx.user_id.unwrap_or(""),
            role = ctx.role.unwrap_or(""),
            endpoint = ctx.endpoint.unwrap_or(""),
            message = %message
        ),
    }
}
