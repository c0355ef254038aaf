//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Backend client facade and wire normalisation."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! In-process backend used by tests and the CLI demo mode.
//!
//! Accounts, tables and remote procedures live in memory behind a
//! `parking_lot` lock. Writes fan out to realtime subscribers the same way
//! the hosted backend would, and the auth subsystem's events are emitted on
//! a broadcast channel.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::client::RemoteClient;
use crate::error::{RemoteError, Result};
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{
    AuthEvent, AuthSession, ChangeHandler, ChangeKind, Filter, Identity, Query, RowChange,
    RowFilter, SubscriptionHandle, SubscriptionKey,
};
use crate::AuthFailureKind;

const MIN_PASSWORD_LEN: usize = 6;
const SESSION_LIFETIME_SECS: i64 = 3600;

/// Server-side handler for a named remote procedure. Receives the caller's
/// identity (if signed in) and the parameter map, returns the `data` payload.
pub type ProcedureHandler =
    Arc<dyn Fn(Option<&Identity>, Value) -> Result<Value> + Send + Sync>;

/// Operations that can have a failure injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    CurrentSession,
    SignIn,
    SignUp,
    SignOut,
    Refresh,
    Select,
    SelectSingle,
    Insert,
    Upsert,
    Update,
    Delete,
    Rpc,
}

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    password: String,
    confirmed: bool,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    tables: HashMap<String, Vec<Value>>,
    session: Option<AuthSession>,
    failures: HashMap<Operation, VecDeque<RemoteError>>,
    calls: Vec<String>,
}

/// Fake backend speaking the [`RemoteClient`] contract.
pub struct InMemoryBackend {
    state: Mutex<State>,
    procedures: RwLock<HashMap<String, ProcedureHandler>>,
    events: broadcast::Sender<AuthEvent>,
    subscriptions: SubscriptionRegistry,
    read_latency: Mutex<Option<Duration>>,
    tokens: AtomicU64,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(State::default()),
            procedures: RwLock::new(HashMap::new()),
            events,
            subscriptions: SubscriptionRegistry::new(),
            read_latency: Mutex::new(None),
            tokens: AtomicU64::new(0),
        }
    }

    /// Register a confirmed account and return its identity.
    pub fn register_user(&self, email: &str, password: &str) -> Identity {
        self.add_account(email, password, true)
    }

    /// Register an account whose email has not been confirmed yet.
    pub fn register_unconfirmed_user(&self, email: &str, password: &str) -> Identity {
        self.add_account(email, password, false)
    }

    fn add_account(&self, email: &str, password: &str, confirmed: bool) -> Identity {
        let identity = Identity::new(Uuid::new_v4().to_string(), email);
        self.state.lock().accounts.insert(
            email.to_ascii_lowercase(),
            Account {
                identity: identity.clone(),
                password: password.to_owned(),
                confirmed,
            },
        );
        identity
    }

    /// Register a remote procedure.
    pub fn register_procedure<F>(&self, name: &str, handler: F)
    where
        F: Fn(Option<&Identity>, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.procedures
            .write()
            .insert(name.to_owned(), Arc::new(handler));
    }

    /// Seed a row without emitting a realtime change.
    pub fn seed_row(&self, table: &str, row: Value) {
        self.state
            .lock()
            .tables
            .entry(table.to_owned())
            .or_default()
            .push(row);
    }

    /// Snapshot of every row stored in `table`.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Delay applied to `select` / `select_single`, to widen race windows in tests.
    pub fn set_read_latency(&self, latency: Option<Duration>) {
        *self.read_latency.lock() = latency;
    }

    /// Make the next call to `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.state
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Emit an auth lifecycle event as if the auth subsystem had raised it.
    pub fn emit_auth_event(&self, event: AuthEvent) {
        if matches!(event, AuthEvent::SignedOut | AuthEvent::UserDeleted) {
            self.state.lock().session = None;
        }
        let _ = self.events.send(event);
    }

    /// Every operation invoked so far, formatted as `operation:target`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn has_subscription(&self, key: &SubscriptionKey) -> bool {
        self.subscriptions.contains(key)
    }

    /// Apply a write as another client would: store it and fan out the change.
    pub fn apply_external_update(&self, table: &str, filters: &[Filter], patch: Value) -> usize {
        self.patch_rows(table, filters, &patch).len()
    }

    /// Insert a row as another client would, fanning out the change.
    pub fn apply_external_insert(&self, table: &str, row: Value) -> Value {
        self.insert_row(table, row)
    }

    fn begin(&self, operation: Operation, target: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("{operation}:{target}"));
        match state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn read_delay(&self) {
        let latency = *self.read_latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn issue_session(&self, identity: Identity) -> AuthSession {
        let serial = self.tokens.fetch_add(1, Ordering::Relaxed) + 1;
        AuthSession {
            access_token: format!("access-{}-{serial}", identity.id),
            refresh_token: format!("refresh-{}-{serial}", identity.id),
            expires_at: Utc::now() + chrono::Duration::seconds(SESSION_LIFETIME_SECS),
            identity,
        }
    }

    fn current_identity(&self) -> Option<Identity> {
        self.state
            .lock()
            .session
            .as_ref()
            .map(|session| session.identity.clone())
    }

    fn insert_row(&self, table: &str, mut row: Value) -> Value {
        if let Value::Object(map) = &mut row {
            map.entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        }
        self.state
            .lock()
            .tables
            .entry(table.to_owned())
            .or_default()
            .push(row.clone());
        self.subscriptions.dispatch(&RowChange {
            table: table.to_owned(),
            kind: ChangeKind::Insert,
            new: row.clone(),
            old: Value::Null,
        });
        row
    }

    fn patch_rows(&self, table: &str, filters: &[Filter], patch: &Value) -> Vec<RowChange> {
        let changes: Vec<RowChange> = {
            let mut state = self.state.lock();
            let Some(rows) = state.tables.get_mut(table) else {
                return Vec::new();
            };
            rows.iter_mut()
                .filter(|row| filters.iter().all(|filter| filter.matches(row)))
                .map(|row| {
                    let old = row.clone();
                    merge(row, patch);
                    RowChange {
                        table: table.to_owned(),
                        kind: ChangeKind::Update,
                        new: row.clone(),
                        old,
                    }
                })
                .collect()
        };
        for change in &changes {
            self.subscriptions.dispatch(change);
        }
        changes
    }
}

fn merge(row: &mut Value, patch: &Value) {
    match (row, patch) {
        (Value::Object(target), Value::Object(fields)) => {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        (row, patch) => *row = patch.clone(),
    }
}

fn row_id(row: &Value) -> Option<&Value> {
    row.get("id")
}

fn apply_order_and_limit(mut rows: Vec<Value>, query: &Query) -> Vec<Value> {
    if let Some(order) = &query.order {
        rows.sort_by(|a, b| {
            let left = a.get(&order.column).map(Value::to_string).unwrap_or_default();
            let right = b.get(&order.column).map(Value::to_string).unwrap_or_default();
            if order.ascending {
                left.cmp(&right)
            } else {
                right.cmp(&left)
            }
        });
    }
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }
    rows
}

#[async_trait]
impl RemoteClient for InMemoryBackend {
    async fn current_session(&self) -> Result<Option<AuthSession>> {
        self.begin(Operation::CurrentSession, "")?;
        Ok(self.state.lock().session.clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.begin(Operation::SignIn, email)?;
        let account = self
            .state
            .lock()
            .accounts
            .get(&email.to_ascii_lowercase())
            .cloned();
        let account = match account {
            Some(account) if account.password == password => account,
            _ => return Err(RemoteError::auth("Invalid login credentials")),
        };
        if !account.confirmed {
            return Err(RemoteError::auth("Email not confirmed"));
        }
        let session = self.issue_session(account.identity);
        self.state.lock().session = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        self.begin(Operation::SignUp, email)?;
        if self
            .state
            .lock()
            .accounts
            .contains_key(&email.to_ascii_lowercase())
        {
            return Err(RemoteError::auth("User already registered"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(RemoteError::auth(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(self.register_unconfirmed_user(email, password))
    }

    async fn sign_out(&self) -> Result<()> {
        let outcome = self.begin(Operation::SignOut, "");
        self.state.lock().session = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        outcome
    }

    async fn refresh_session(&self) -> Result<AuthSession> {
        self.begin(Operation::Refresh, "")?;
        let Some(identity) = self.current_identity() else {
            return Err(RemoteError::Auth {
                kind: AuthFailureKind::MissingSession,
                message: "Auth session missing".to_owned(),
            });
        };
        let session = self.issue_session(identity);
        self.state.lock().session = Some(session.clone());
        let _ = self.events.send(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        self.begin(Operation::Select, table)?;
        self.read_delay().await;
        let rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| query.matches(row))
            .collect();
        Ok(apply_order_and_limit(rows, query))
    }

    async fn select_single(&self, table: &str, query: &Query) -> Result<Value> {
        self.begin(Operation::SelectSingle, table)?;
        self.read_delay().await;
        self.rows(table)
            .into_iter()
            .find(|row| query.matches(row))
            .ok_or_else(|| RemoteError::NotFound(table.to_owned()))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.begin(Operation::Insert, table)?;
        if let Some(id) = row_id(&row) {
            let duplicate = self
                .rows(table)
                .iter()
                .any(|existing| row_id(existing) == Some(id));
            if duplicate {
                return Err(RemoteError::rejected(
                    409,
                    Some("duplicate key value violates unique constraint".to_owned()),
                ));
            }
        }
        Ok(self.insert_row(table, row))
    }

    async fn upsert(&self, table: &str, row: Value) -> Result<Value> {
        self.begin(Operation::Upsert, table)?;
        let Some(id) = row_id(&row).cloned() else {
            return Ok(self.insert_row(table, row));
        };
        let filter = Filter::Eq("id".to_owned(), id);
        match self.patch_rows(table, std::slice::from_ref(&filter), &row).pop() {
            Some(change) => Ok(change.new),
            None => Ok(self.insert_row(table, row)),
        }
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        self.begin(Operation::Update, table)?;
        Ok(self
            .patch_rows(table, filters, &patch)
            .into_iter()
            .map(|change| change.new)
            .collect())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize> {
        self.begin(Operation::Delete, table)?;
        let removed: Vec<Value> = {
            let mut state = self.state.lock();
            let Some(rows) = state.tables.get_mut(table) else {
                return Ok(0);
            };
            let (removed, kept): (Vec<Value>, Vec<Value>) = rows
                .drain(..)
                .partition(|row| filters.iter().all(|filter| filter.matches(row)));
            *rows = kept;
            removed
        };
        for row in &removed {
            self.subscriptions.dispatch(&RowChange {
                table: table.to_owned(),
                kind: ChangeKind::Delete,
                new: Value::Null,
                old: row.clone(),
            });
        }
        Ok(removed.len())
    }

    async fn rpc(&self, name: &str, params: Value) -> Result<Value> {
        self.begin(Operation::Rpc, name)?;
        let handler = self.procedures.read().get(name).cloned();
        let Some(handler) = handler else {
            return Err(RemoteError::rejected(
                404,
                Some(format!("Function {name} not found")),
            ));
        };
        let caller = self.current_identity();
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        debug!(procedure = name, "in-memory rpc");
        handler(caller.as_ref(), params)
    }

    async fn subscribe(
        &self,
        key: SubscriptionKey,
        filter: Option<RowFilter>,
        handler: ChangeHandler,
    ) -> Result<SubscriptionHandle> {
        let (handle, _replaced) = self.subscriptions.insert(key, filter, handler);
        Ok(handle)
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.subscriptions.remove(handle)
    }

    fn unsubscribe_all(&self) -> usize {
        self.subscriptions.clear().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn sign_in_failures_are_classified() {
        let backend = InMemoryBackend::new();
        backend.register_user("agent@factory.test", "secret-1");
        backend.register_unconfirmed_user("new@factory.test", "secret-2");

        let err = backend
            .sign_in_with_password("agent@factory.test", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(&AuthFailureKind::InvalidCredentials));

        let err = backend
            .sign_in_with_password("new@factory.test", "secret-2")
            .await
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(&AuthFailureKind::EmailNotConfirmed));

        let err = backend
            .sign_up("agent@factory.test", "another-secret")
            .await
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(&AuthFailureKind::AlreadyRegistered));
    }

    #[tokio::test]
    async fn sign_in_emits_event_and_restores_session() {
        let backend = InMemoryBackend::new();
        let identity = backend.register_user("agent@factory.test", "secret-1");
        let mut events = backend.auth_events();

        let session = backend
            .sign_in_with_password("AGENT@factory.test", "secret-1")
            .await
            .unwrap();
        assert_eq!(session.identity, identity);
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));
        assert_eq!(
            backend.current_session().await.unwrap().map(|s| s.identity),
            Some(identity)
        );

        backend.sign_out().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
        assert!(backend.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn select_single_reports_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend
            .select_single("profiles", &Query::new().eq("id", "missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn writes_fan_out_to_subscribers() {
        let backend = InMemoryBackend::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        backend
            .subscribe(
                SubscriptionKey::new("profiles", ChangeKind::Update),
                Some(RowFilter::eq("id", "u-1")),
                Arc::new(move |change: &RowChange| {
                    assert_eq!(change.new["department"], "assembly");
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        backend.seed_row("profiles", json!({"id": "u-1", "department": null}));
        backend.seed_row("profiles", json!({"id": "u-2", "department": null}));
        backend
            .update(
                "profiles",
                &[Filter::eq("id", "u-1")],
                json!({"department": "assembly"}),
            )
            .await
            .unwrap();
        backend
            .update(
                "profiles",
                &[Filter::eq("id", "u-2")],
                json!({"department": "assembly"}),
            )
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(backend.unsubscribe_all(), 1);
        backend.apply_external_update(
            "profiles",
            &[Filter::eq("id", "u-1")],
            json!({"department": "assembly"}),
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upsert_merges_existing_rows() {
        let backend = InMemoryBackend::new();
        backend
            .upsert("profiles", json!({"id": "u-1", "role": "agent", "shift": "A"}))
            .await
            .unwrap();
        let merged = backend
            .upsert("profiles", json!({"id": "u-1", "shift": "B"}))
            .await
            .unwrap();
        assert_eq!(merged["role"], "agent");
        assert_eq!(merged["shift"], "B");
        assert_eq!(backend.rows("profiles").len(), 1);
    }

    #[tokio::test]
    async fn rpc_dispatches_and_injects_failures() {
        let backend = InMemoryBackend::new();
        backend.register_procedure("get-dashboard-data", |caller, params| {
            Ok(json!({"caller": caller.map(|c| c.id.clone()), "params": params}))
        });

        let data = backend
            .rpc("get-dashboard-data", Value::Null)
            .await
            .unwrap();
        assert_eq!(data["caller"], Value::Null);
        assert_eq!(data["params"], json!({}));

        backend.fail_next(Operation::Rpc, RemoteError::Transport("offline".into()));
        assert!(backend
            .rpc("get-dashboard-data", json!({}))
            .await
            .unwrap_err()
            .is_transport());

        let missing = backend.rpc("nope", json!({})).await.unwrap_err();
        assert_eq!(missing.status(), Some(404));
        assert!(backend.calls().contains(&"rpc:nope".to_owned()));
    }
}
