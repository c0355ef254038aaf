//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use fwm_common::StoreError;
use fwm_remote::{AuthFailureKind, RemoteError};
use thiserror::Error;

/// Errors raised by the session holder.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation that requires a signed-in identity was called without one.
    #[error("no authenticated session")]
    NotAuthenticated,
    /// A later sign-out or sign-in superseded the operation.
    #[error("session changed while {0} was in flight")]
    Superseded(&'static str),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A profile row could not be decoded or encoded.
    #[error("invalid profile record: {0}")]
    InvalidProfile(String),
}

/// Category of a failed login, used to pick the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailureReason {
    /// The auth subsystem rejected the credentials or the request.
    Auth(AuthFailureKind),
    /// The backend could not be reached.
    Network,
    /// Credentials were accepted but the profile could not be loaded.
    Profile,
}

/// Non-throwing login outcome carrying a localized message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LoginFailure {
    pub reason: LoginFailureReason,
    pub message: String,
}
