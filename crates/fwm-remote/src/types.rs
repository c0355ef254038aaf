//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Backend client facade and wire normalisation."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

/// Identifier issued by the auth subsystem.
pub type UserId = String;

/// Externally issued authenticated user reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub email: String,
}

impl Identity {
    pub fn new(id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// Live authentication token bound to an [`Identity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl AuthSession {
    /// Whether the access token is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Lifecycle notifications emitted by the auth subsystem, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut,
    UserUpdated(AuthSession),
    UserDeleted,
    TokenRefreshed(AuthSession),
}

impl AuthEvent {
    /// Short label used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "signed_in",
            AuthEvent::SignedOut => "signed_out",
            AuthEvent::UserUpdated(_) => "user_updated",
            AuthEvent::UserDeleted => "user_deleted",
            AuthEvent::TokenRefreshed(_) => "token_refreshed",
        }
    }
}

/// Row filter applied to table reads, updates and deletes.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) | Filter::In(column, _) => column,
        }
    }

    /// Whether `row` satisfies the filter.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::Eq(column, expected) => row
                .get(column)
                .is_some_and(|actual| values_equal(actual, expected)),
            Filter::In(column, candidates) => row.get(column).is_some_and(|actual| {
                candidates
                    .iter()
                    .any(|candidate| values_equal(actual, candidate))
            }),
        }
    }

    /// PostgREST query-string form (`column`, `eq.value`).
    pub fn to_query_pair(&self) -> (String, String) {
        match self {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", value_text(value))),
            Filter::In(column, values) => {
                let list = values.iter().map(value_text).collect::<Vec<_>>().join(",");
                (column.clone(), format!("in.({list})"))
            }
        }
    }
}

/// Sort order for table reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Table read description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn one_of(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(column.into(), values));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(row))
    }
}

/// Body convention of remote procedures: `{success, data?, message?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RpcEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Row-level change categories delivered by the realtime channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum ChangeKind {
    #[strum(serialize = "INSERT")]
    #[serde(rename = "INSERT")]
    Insert,
    #[strum(serialize = "UPDATE")]
    #[serde(rename = "UPDATE")]
    Update,
    #[strum(serialize = "DELETE")]
    #[serde(rename = "DELETE")]
    Delete,
    #[strum(serialize = "*")]
    #[serde(rename = "*")]
    All,
}

impl ChangeKind {
    /// Whether a subscription for `self` receives a change of kind `other`.
    pub fn accepts(&self, other: ChangeKind) -> bool {
        *self == ChangeKind::All || *self == other
    }
}

/// Realtime subscriptions are keyed by table and change kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub table: String,
    pub kind: ChangeKind,
}

impl SubscriptionKey {
    pub fn new(table: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            table: table.into(),
            kind,
        }
    }

    /// Channel topic used on the realtime socket.
    pub fn topic(&self) -> String {
        format!("realtime:{}:{}", self.table, self.kind.as_ref().to_ascii_lowercase())
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.kind)
    }
}

/// Row predicate attached to a realtime subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    Eq { column: String, value: String },
    AnyOf(Vec<RowFilter>),
}

impl RowFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        RowFilter::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Value) -> bool {
        match self {
            RowFilter::Eq { column, value } => row
                .get(column)
                .is_some_and(|actual| value_text(actual) == *value),
            RowFilter::AnyOf(filters) => filters.iter().any(|filter| filter.matches(row)),
        }
    }

    /// Server-side filter text, when the realtime service can express it.
    /// Disjunctions are evaluated client-side only.
    pub fn server_expression(&self) -> Option<String> {
        match self {
            RowFilter::Eq { column, value } => Some(format!("{column}=eq.{value}")),
            RowFilter::AnyOf(_) => None,
        }
    }
}

/// A row change delivered to subscription handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub table: String,
    pub kind: ChangeKind,
    pub new: Value,
    pub old: Value,
}

impl RowChange {
    /// The row a filter should be evaluated against.
    pub fn subject(&self) -> &Value {
        if self.kind == ChangeKind::Delete {
            &self.old
        } else {
            &self.new
        }
    }
}

/// Callback invoked for every matching [`RowChange`].
pub type ChangeHandler = Arc<dyn Fn(&RowChange) + Send + Sync>;

/// Opaque handle returned by a subscription; release it to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub(crate) id: u64,
    pub(crate) key: SubscriptionKey,
}

impl SubscriptionHandle {
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }
}

/// Text form used for filter comparisons: bare strings, JSON for the rest.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    actual == expected || value_text(actual) == value_text(expected)
}
