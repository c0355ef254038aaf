//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Backend client facade and wire normalisation."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! HTTP implementation of [`RemoteClient`] against the hosted backend.
//!
//! Tables are served under `/rest/v1/{table}` with PostgREST-style filters,
//! auth under `/auth/v1/*` and remote procedures under `/functions/v1/{name}`.
//! Every request carries the `apikey` header and a bearer token read from the
//! token store, falling back to the anonymous key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fwm_common::{BackendConfig, LocalStore};
use parking_lot::Mutex;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::RemoteClient;
use crate::error::{RemoteError, Result};
use crate::realtime::{realtime_url, RealtimeConnection};
use crate::subscriptions::SubscriptionRegistry;
use crate::token::TokenStore;
use crate::types::{
    AuthEvent, AuthSession, ChangeHandler, Filter, Identity, Query, RowFilter,
    RpcEnvelope, SubscriptionHandle, SubscriptionKey,
};
use crate::AuthFailureKind;

const AUTH_EVENT_CAPACITY: usize = 64;
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Which bearer token a request carries.
#[derive(Debug, Clone, Copy)]
enum Bearer<'a> {
    /// Stored session token, anonymous key when signed out.
    Session,
    Anon,
    Token(&'a str),
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserPayload> for Identity {
    fn from(user: UserPayload) -> Self {
        Identity::new(user.id, user.email.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserPayload,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let now = Utc::now();
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| {
                now + chrono::Duration::seconds(
                    self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
                )
            });
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            identity: self.user.into(),
        }
    }
}

/// Client for a hosted backend reachable over HTTP.
pub struct HttpRemoteClient {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    tokens: TokenStore,
    events: broadcast::Sender<AuthEvent>,
    subscriptions: Arc<SubscriptionRegistry>,
    realtime: Mutex<Option<RealtimeConnection>>,
    realtime_url: Url,
    heartbeat: Duration,
}

impl HttpRemoteClient {
    pub fn new(config: &BackendConfig, store: Arc<dyn LocalStore>) -> Result<Self> {
        config
            .validate()
            .map_err(|err| RemoteError::Config(format!("{err:#}")))?;
        let base = config
            .base_url()
            .map_err(|err| RemoteError::Config(format!("{err:#}")))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| RemoteError::Config(err.to_string()))?;
        let realtime_url = realtime_url(&base, &config.realtime_path, &config.anon_key)?;
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Ok(Self {
            http,
            base,
            anon_key: config.anon_key.clone(),
            tokens: TokenStore::new(store),
            events,
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            realtime: Mutex::new(None),
            realtime_url,
            heartbeat: config.heartbeat_interval,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|err| RemoteError::Config(format!("invalid endpoint {path}: {err}")))
    }

    fn emit(&self, event: AuthEvent) {
        debug!(event = event.name(), "auth event");
        // No receivers is fine; nobody is listening yet.
        let _ = self.events.send(event);
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        prefer: Option<&str>,
        bearer: Bearer<'_>,
    ) -> Result<Value> {
        let url = self.endpoint(path)?;
        let token = match bearer {
            Bearer::Session => self
                .tokens
                .access_token()
                .unwrap_or_else(|| self.anon_key.clone()),
            Bearer::Anon => self.anon_key.clone(),
            Bearer::Token(token) => token.to_owned(),
        };

        let mut request = self
            .http
            .request(method.clone(), url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, path, status = status.as_u16(), "backend response");

        if !status.is_success() {
            return Err(RemoteError::rejected(status.as_u16(), error_message(&text)));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<AuthSession> {
        let value = self
            .send(
                Method::POST,
                "/auth/v1/token",
                &[("grant_type".to_owned(), grant_type.to_owned())],
                Some(&body),
                None,
                Bearer::Anon,
            )
            .await
            .map_err(auth_rejection)?;
        let response: TokenResponse = serde_json::from_value(value)?;
        Ok(response.into_session())
    }

    fn install_session(&self, session: &AuthSession) -> Result<()> {
        self.tokens.save(session)
    }

    fn realtime_connection(&self) -> parking_lot::MutexGuard<'_, Option<RealtimeConnection>> {
        let mut guard = self.realtime.lock();
        if guard.is_none() {
            *guard = Some(RealtimeConnection::spawn(
                self.realtime_url.clone(),
                self.heartbeat,
                self.subscriptions.clone(),
                self.tokens.clone(),
            ));
        }
        guard
    }
}

/// Pull the most specific message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_str))
        .map(str::to_owned)
}

/// Client-side rejections from the auth endpoints become
/// [`RemoteError::Auth`]. Server faults stay [`RemoteError::Rejected`].
fn auth_rejection(err: RemoteError) -> RemoteError {
    match err {
        RemoteError::Rejected { status: 429, message } => RemoteError::Auth {
            kind: AuthFailureKind::RateLimited,
            message,
        },
        RemoteError::Rejected {
            status: 400 | 401 | 403 | 422,
            message,
        } => RemoteError::auth(message),
        other => other,
    }
}

fn filter_pairs(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_query_pair).collect()
}

fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_owned(), "*".to_owned())];
    pairs.extend(filter_pairs(&query.filters));
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.push(("order".to_owned(), format!("{}.{direction}", order.column)));
    }
    if let Some(limit) = query.limit {
        pairs.push(("limit".to_owned(), limit.to_string()));
    }
    pairs
}

fn rows(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

fn first_row(table: &str, value: Value) -> Result<Value> {
    rows(value)?
        .into_iter()
        .next()
        .ok_or_else(|| RemoteError::Decode(format!("{table}: write returned no representation")))
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn current_session(&self) -> Result<Option<AuthSession>> {
        let Some(stored) = self.tokens.load() else {
            return Ok(None);
        };

        if !stored.is_expired_at(Utc::now()) {
            let validated = self
                .send(
                    Method::GET,
                    "/auth/v1/user",
                    &[],
                    None,
                    None,
                    Bearer::Token(&stored.access_token),
                )
                .await;
            match validated {
                Ok(_) => return Ok(Some(stored)),
                Err(err) if matches!(err.status(), Some(401) | Some(403)) => {
                    debug!("stored access token rejected; attempting refresh");
                }
                Err(err) => return Err(err),
            }
        }

        match self.refresh_session().await {
            Ok(session) => Ok(Some(session)),
            Err(RemoteError::Auth { kind, message }) if kind != AuthFailureKind::RateLimited => {
                info!(reason = %message, "stored session is no longer valid");
                self.tokens.clear()?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        self.install_session(&session)?;
        info!(user_id = %session.identity.id, "signed in");
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        let value = self
            .send(
                Method::POST,
                "/auth/v1/signup",
                &[],
                Some(&json!({ "email": email, "password": password })),
                None,
                Bearer::Anon,
            )
            .await
            .map_err(auth_rejection)?;
        let user = value.get("user").cloned().unwrap_or(value);
        let user: UserPayload = serde_json::from_value(user)?;
        Ok(user.into())
    }

    async fn sign_out(&self) -> Result<()> {
        let outcome = match self.tokens.access_token() {
            Some(token) => self
                .send(
                    Method::POST,
                    "/auth/v1/logout",
                    &[],
                    None,
                    None,
                    Bearer::Token(&token),
                )
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        let cleared = self.tokens.clear();
        self.emit(AuthEvent::SignedOut);
        if let Err(err) = &outcome {
            warn!(error = %err, "backend sign-out failed; local tokens dropped");
        }
        outcome.and(cleared)
    }

    async fn refresh_session(&self) -> Result<AuthSession> {
        let Some(stored) = self.tokens.load() else {
            return Err(RemoteError::Auth {
                kind: AuthFailureKind::MissingSession,
                message: "Auth session missing".to_owned(),
            });
        };
        let session = self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": stored.refresh_token }),
            )
            .await?;
        self.install_session(&session)?;
        self.emit(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let value = self
            .send(
                Method::GET,
                &format!("/rest/v1/{table}"),
                &query_pairs(query),
                None,
                None,
                Bearer::Session,
            )
            .await?;
        rows(value)
    }

    async fn select_single(&self, table: &str, query: &Query) -> Result<Value> {
        let query = query.clone().limit(1);
        self.select(table, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(table.to_owned()))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let value = self
            .send(
                Method::POST,
                &format!("/rest/v1/{table}"),
                &[],
                Some(&row),
                Some("return=representation"),
                Bearer::Session,
            )
            .await?;
        first_row(table, value)
    }

    async fn upsert(&self, table: &str, row: Value) -> Result<Value> {
        let value = self
            .send(
                Method::POST,
                &format!("/rest/v1/{table}"),
                &[],
                Some(&row),
                Some("resolution=merge-duplicates,return=representation"),
                Bearer::Session,
            )
            .await?;
        first_row(table, value)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        let value = self
            .send(
                Method::PATCH,
                &format!("/rest/v1/{table}"),
                &filter_pairs(filters),
                Some(&patch),
                Some("return=representation"),
                Bearer::Session,
            )
            .await?;
        rows(value)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize> {
        let value = self
            .send(
                Method::DELETE,
                &format!("/rest/v1/{table}"),
                &filter_pairs(filters),
                None,
                Some("return=representation"),
                Bearer::Session,
            )
            .await?;
        Ok(rows(value)?.len())
    }

    async fn rpc(&self, name: &str, params: Value) -> Result<Value> {
        let value = self
            .send(
                Method::POST,
                &format!("/functions/v1/{name}"),
                &[],
                Some(&params),
                None,
                Bearer::Session,
            )
            .await?;
        let envelope: RpcEnvelope = serde_json::from_value(value)
            .map_err(|err| RemoteError::Decode(format!("{name}: {err}")))?;
        if envelope.success {
            Ok(envelope.data.unwrap_or(Value::Null))
        } else {
            Err(RemoteError::Procedure {
                name: name.to_owned(),
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("{name} reported failure")),
            })
        }
    }

    async fn subscribe(
        &self,
        key: SubscriptionKey,
        filter: Option<RowFilter>,
        handler: ChangeHandler,
    ) -> Result<SubscriptionHandle> {
        let (handle, replaced) = self
            .subscriptions
            .insert(key.clone(), filter.clone(), handler);
        let token = self.tokens.access_token();
        let connection = self.realtime_connection();
        if let Some(conn) = connection.as_ref() {
            if replaced.is_some() {
                conn.leave(&key);
            }
            conn.join(&key, filter.as_ref(), token.as_deref());
        }
        debug!(key = %key, filter = ?filter.as_ref().map(|f| f.server_expression()), "subscribed");
        Ok(handle)
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = self.subscriptions.remove(handle);
        if removed {
            if let Some(conn) = self.realtime.lock().as_ref() {
                conn.leave(handle.key());
            }
        }
        removed
    }

    fn unsubscribe_all(&self) -> usize {
        let keys = self.subscriptions.clear();
        let connection = self.realtime.lock().take();
        if let Some(conn) = &connection {
            for key in &keys {
                conn.leave(key);
            }
        }
        // Dropping the connection closes the socket task.
        drop(connection);
        keys.len()
    }
}
