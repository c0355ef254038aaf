//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Backend client facade and wire normalisation."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Remote client facade for the hosted backend.
//!
//! [`RemoteClient`] is the only contract the session and dashboard layers
//! depend on. [`HttpRemoteClient`] talks to the real service;
//! [`InMemoryBackend`] implements the same contract in-process.

pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod realtime;
pub mod subscriptions;
pub mod token;
pub mod types;

pub use client::RemoteClient;
pub use error::{status_message, AuthFailureKind, RemoteError, Result};
pub use http::HttpRemoteClient;
pub use memory::{InMemoryBackend, Operation, ProcedureHandler};
pub use subscriptions::{ActiveSubscription, SubscriptionRegistry};
pub use token::{TokenStore, AUTH_TOKEN_KEY};
pub use types::{
    AuthEvent, AuthSession, ChangeHandler, ChangeKind, Filter, Identity, Order, Query, RowChange,
    RowFilter, RpcEnvelope, SubscriptionHandle, SubscriptionKey, UserId,
};
