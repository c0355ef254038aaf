//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Backend client facade and wire normalisation."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::types::{
    AuthEvent, AuthSession, ChangeHandler, Filter, Identity, Query, RowFilter, SubscriptionHandle,
    SubscriptionKey,
};

/// Contract between the session/dashboard layers and the hosted backend.
///
/// Implementations own transport details; consumers only see normalised
/// [`crate::RemoteError`]s.
#[async_trait]
pub trait RemoteClient: Send + Sync + 'static {
    /// Return the restorable session, if the token store holds a valid one.
    async fn current_session(&self) -> Result<Option<AuthSession>>;

    /// Validate credentials and establish a session.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Register a new account.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity>;

    /// Revoke the current session. Local tokens are dropped even if the backend call fails.
    async fn sign_out(&self) -> Result<()>;

    /// Exchange the refresh token for a new access token.
    async fn refresh_session(&self) -> Result<AuthSession>;

    /// Subscribe to auth lifecycle events.
    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;

    /// Read rows from `table`.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>>;

    /// Read exactly one row; zero rows yields [`crate::RemoteError::NotFound`].
    async fn select_single(&self, table: &str, query: &Query) -> Result<Value>;

    /// Insert a row and return the stored representation.
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Insert or merge a row by primary key and return the stored representation.
    async fn upsert(&self, table: &str, row: Value) -> Result<Value>;

    /// Patch every row matching `filters`.
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>>;

    /// Delete every row matching `filters`, returning the number removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize>;

    /// Invoke a named remote procedure and return its `data` payload.
    async fn rpc(&self, name: &str, params: Value) -> Result<Value>;

    /// Subscribe to row changes. An existing subscription with the same key is
    /// released first.
    async fn subscribe(
        &self,
        key: SubscriptionKey,
        filter: Option<RowFilter>,
        handler: ChangeHandler,
    ) -> Result<SubscriptionHandle>;

    /// Release one subscription. Returns false when the handle was already released.
    fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool;

    /// Release every active subscription, returning how many were released.
    fn unsubscribe_all(&self) -> usize;
}
