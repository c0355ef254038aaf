//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Backend client facade and wire normalisation."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared result type for facade operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Normalised failure raised by every [`crate::RemoteClient`] operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    /// No response was received (connect, timeout, TLS, ...).
    #[error("network failure: {0}")]
    Transport(String),
    /// The backend answered with a non-2xx status.
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The auth subsystem refused the operation.
    #[error("authentication rejected: {message}")]
    Auth {
        kind: AuthFailureKind,
        message: String,
    },
    /// A single-row fetch matched nothing.
    #[error("no matching record in {0}")]
    NotFound(String),
    /// A remote procedure answered `success: false`.
    #[error("remote procedure {name} failed: {message}")]
    Procedure { name: String, message: String },
    /// The response body could not be interpreted.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// The realtime channel failed or is unavailable.
    #[error("realtime channel error: {0}")]
    Realtime(String),
    /// The local token store could not be read or written.
    #[error("token store error: {0}")]
    Storage(String),
    /// The client was constructed with an unusable configuration.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl RemoteError {
    /// Build a rejection from an HTTP status, preferring the backend's message.
    pub fn rejected(status: u16, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| status_message(status));
        RemoteError::Rejected { status, message }
    }

    /// Build an auth failure from the subsystem's raw message.
    pub fn auth(message: impl Into<String>) -> Self {
        let message = message.into();
        RemoteError::Auth {
            kind: AuthFailureKind::classify(&message),
            message,
        }
    }

    /// True for the "record absent" signal of a single-row fetch.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    /// True when no response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }

    /// No usable answer: the request never arrived or the server faulted.
    pub fn is_unavailable(&self) -> bool {
        self.is_transport() || self.status().is_some_and(|status| status >= 500)
    }

    /// HTTP status carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Auth cause carried by the failure, if any.
    pub fn auth_kind(&self) -> Option<&AuthFailureKind> {
        match self {
            RemoteError::Auth { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return RemoteError::rejected(status.as_u16(), None);
        }
        if err.is_decode() {
            return RemoteError::Decode(err.to_string());
        }
        RemoteError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err.to_string())
    }
}

impl From<fwm_common::StoreError> for RemoteError {
    fn from(err: fwm_common::StoreError) -> Self {
        RemoteError::Storage(err.to_string())
    }
}

/// Fallback message derived from an HTTP status code.
pub fn status_message(status: u16) -> String {
    match status {
        400 => "Bad request".to_owned(),
        401 => "Authentication required".to_owned(),
        403 => "Access denied".to_owned(),
        404 => "Resource not found".to_owned(),
        409 => "Conflicting update".to_owned(),
        422 => "Request could not be processed".to_owned(),
        429 => "Too many requests".to_owned(),
        500..=599 => format!("Server error ({status})"),
        other => format!("Request failed with status {other}"),
    }
}

/// Known causes of auth-subsystem rejections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailureKind {
    InvalidCredentials,
    EmailNotConfirmed,
    AlreadyRegistered,
    WeakPassword,
    RateLimited,
    MissingSession,
    /// Unmapped cause; carries the raw message.
    Other(String),
}

impl AuthFailureKind {
    /// Map a raw auth-subsystem message onto a known cause.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.contains("invalid login credentials") || lower.contains("invalid grant") {
            AuthFailureKind::InvalidCredentials
        } else if lower.contains("email not confirmed") {
            AuthFailureKind::EmailNotConfirmed
        } else if lower.contains("already registered") || lower.contains("already exists") {
            AuthFailureKind::AlreadyRegistered
        } else if lower.contains("password should be") || lower.contains("weak password") {
            AuthFailureKind::WeakPassword
        } else if lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("for security purposes")
        {
            AuthFailureKind::RateLimited
        } else if lower.contains("session missing")
            || lower.contains("session not found")
            || lower.contains("refresh token not found")
        {
            AuthFailureKind::MissingSession
        } else {
            AuthFailureKind::Other(raw.to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_auth_messages() {
        assert_eq!(
            AuthFailureKind::classify("Invalid login credentials"),
            AuthFailureKind::InvalidCredentials
        );
        assert_eq!(
            AuthFailureKind::classify("Email not confirmed"),
            AuthFailureKind::EmailNotConfirmed
        );
        assert_eq!(
            AuthFailureKind::classify("User already registered"),
            AuthFailureKind::AlreadyRegistered
        );
        assert_eq!(
            AuthFailureKind::classify("Password should be at least 6 characters"),
            AuthFailureKind::WeakPassword
        );
        assert_eq!(
            AuthFailureKind::classify("Email rate limit exceeded"),
            AuthFailureKind::RateLimited
        );
        assert_eq!(
            AuthFailureKind::classify("Auth session missing!"),
            AuthFailureKind::MissingSession
        );
    }

    #[test]
    fn unmapped_auth_message_is_preserved() {
        assert_eq!(
            AuthFailureKind::classify("Signups not allowed for this instance"),
            AuthFailureKind::Other("Signups not allowed for this instance".into())
        );
    }

    #[test]
    fn rejection_falls_back_to_status_message() {
        assert_eq!(
            RemoteError::rejected(403, None),
            RemoteError::Rejected {
                status: 403,
                message: "Access denied".into()
            }
        );
        assert_eq!(
            RemoteError::rejected(500, Some("  ".into())).to_string(),
            "remote rejected request (500): Server error (500)"
        );
        assert_eq!(
            RemoteError::rejected(400, Some("line already assigned".into())).status(),
            Some(400)
        );
    }

    #[test]
    fn server_faults_and_transport_count_as_unavailable() {
        assert!(RemoteError::Transport("connection reset".into()).is_unavailable());
        assert!(RemoteError::rejected(502, None).is_unavailable());
        assert!(!RemoteError::rejected(429, None).is_unavailable());
        assert!(!RemoteError::auth("Invalid login credentials").is_unavailable());
    }
}
