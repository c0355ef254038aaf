//! ---
//! fwm_section: "12-dashboard-presentation"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Role-scoped dashboard data, polling and actions."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Data side of the role dashboard.
//!
//! The controller reads the signed-in profile from the session, fetches the
//! role's aggregates and keeps them in a widget map that is updated in
//! place. It follows the session through its events: profile changes
//! trigger a refresh, notifications land in a bounded feed and a sign-out
//! clears everything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fwm_common::DashboardConfig;
use fwm_logging::{fwm_debug, fwm_info, fwm_warn, log_operation_event, LogContext, OperationOutcome};
use fwm_session::{EventKind, ListenerId, SessionContext, SessionEvent};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::action::DashboardAction;
use crate::error::DashboardError;
use crate::feed::NotificationFeed;
use crate::kind::DashboardKind;
use crate::widget::{RefreshSummary, Widget, WidgetMap};

/// Point-in-time copy of the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub kind: Option<DashboardKind>,
    pub route: Option<&'static str>,
    /// Number of refreshes applied since the controller was created.
    pub revision: u64,
    pub widgets: Vec<Widget>,
    pub notifications: Vec<Value>,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub visible: bool,
}

struct DashboardState {
    kind: Option<DashboardKind>,
    widgets: WidgetMap,
    feed: NotificationFeed,
    revision: u64,
    last_refreshed: Option<DateTime<Utc>>,
}

struct Inner {
    session: SessionContext,
    state: RwLock<DashboardState>,
    visible: AtomicBool,
    refresh_lock: tokio::sync::Mutex<()>,
}

pub struct DashboardController {
    inner: Arc<Inner>,
    listeners: Vec<ListenerId>,
}

impl DashboardController {
    pub fn new(session: SessionContext, config: &DashboardConfig) -> Self {
        let inner = Arc::new(Inner {
            session: session.clone(),
            state: RwLock::new(DashboardState {
                kind: None,
                widgets: WidgetMap::new(),
                feed: NotificationFeed::new(config.notification_capacity),
                revision: 0,
                last_refreshed: None,
            }),
            visible: AtomicBool::new(true),
            refresh_lock: tokio::sync::Mutex::new(()),
        });

        let mut listeners = Vec::with_capacity(3);
        let weak = Arc::downgrade(&inner);
        listeners.push(session.add_listener(EventKind::ProfileUpdated, move |_| {
            Inner::schedule_refresh(&weak);
            Ok(())
        }));
        let weak = Arc::downgrade(&inner);
        listeners.push(session.add_listener(EventKind::NewNotification, move |event| {
            if let (Some(inner), SessionEvent::NewNotification(row)) = (weak.upgrade(), event) {
                inner.state.write().feed.push(row.clone());
            }
            Ok(())
        }));
        let weak = Arc::downgrade(&inner);
        listeners.push(session.add_listener(EventKind::SignedOut, move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.reset();
            }
            Ok(())
        }));

        Self { inner, listeners }
    }

    /// Fetch the role's aggregates and merge them into the widget map.
    pub async fn refresh(&self) -> Result<RefreshSummary, DashboardError> {
        self.inner.refresh().await
    }

    /// Run a user action, then refresh so the widgets reflect it.
    pub async fn perform(&self, action: DashboardAction) -> Result<Value, DashboardError> {
        let inner = &self.inner;
        let profile = inner
            .session
            .profile()
            .ok_or(DashboardError::NotAuthenticated)?;
        let required = action.required_role();
        if !inner.session.has_permission(required) {
            return Err(DashboardError::Forbidden {
                action: action.name(),
                required,
            });
        }

        let ctx = LogContext::operation(action.name())
            .with_user(&profile.id)
            .with_role(profile.role.as_ref())
            .with_endpoint(action.endpoint());
        let result = match inner
            .session
            .remote()
            .rpc(action.endpoint(), action.params())
            .await
        {
            Ok(result) => result,
            Err(err) => {
                log_operation_event(
                    Some(&ctx),
                    "dashboard.action",
                    &format!("action failed: {err}"),
                    OperationOutcome::Fault,
                );
                return Err(err.into());
            }
        };
        log_operation_event(
            Some(&ctx),
            "dashboard.action",
            "action completed",
            OperationOutcome::Success,
        );

        if let Err(err) = inner.refresh().await {
            fwm_warn!(context = ctx, "refresh after action failed: {err}");
        }
        Ok(result)
    }

    /// Mark the dashboard as shown or hidden. Hidden dashboards skip polls.
    pub fn set_visible(&self, visible: bool) {
        self.inner.visible.store(visible, Ordering::SeqCst);
    }

    pub fn is_visible(&self) -> bool {
        self.inner.visible.load(Ordering::SeqCst)
    }

    /// Refresh every `interval` until `shutdown` flips to true or its sender
    /// is dropped. Ticks are skipped while hidden; failures are logged.
    pub async fn run_polling(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let ctx = LogContext::operation("dashboard.poll");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.is_visible() {
                        fwm_debug!(context = ctx, "dashboard hidden; skipping poll");
                        continue;
                    }
                    match self.inner.refresh().await {
                        Ok(_) => {}
                        Err(DashboardError::NotAuthenticated | DashboardError::SetupRequired) => {
                            fwm_debug!(context = ctx, "no dashboard to poll yet");
                        }
                        Err(err) => fwm_warn!(context = ctx, "poll failed: {err}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        fwm_debug!(context = ctx, "dashboard polling stopped");
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = self.inner.state.read();
        DashboardSnapshot {
            kind: state.kind,
            route: state.kind.map(DashboardKind::route),
            revision: state.revision,
            widgets: state.widgets.iter().cloned().collect(),
            notifications: state.feed.entries(),
            last_refreshed: state.last_refreshed,
            visible: self.is_visible(),
        }
    }

    pub fn widget(&self, name: &str) -> Option<Widget> {
        self.inner.state.read().widgets.get(name).cloned()
    }

    pub fn notifications(&self) -> Vec<Value> {
        self.inner.state.read().feed.entries()
    }

    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }
}

impl Drop for DashboardController {
    fn drop(&mut self) {
        for id in self.listeners.drain(..) {
            self.inner.session.remove_listener(id);
        }
    }
}

impl Inner {
    fn schedule_refresh(weak: &Weak<Inner>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            match inner.refresh().await {
                Ok(_) | Err(DashboardError::SetupRequired) => {}
                Err(err) => fwm_warn!(
                    context = LogContext::operation("dashboard.refresh"),
                    "refresh after profile change failed: {err}"
                ),
            }
        });
    }

    fn reset(&self) {
        let mut state = self.state.write();
        state.kind = None;
        state.widgets.clear();
        state.feed.clear();
        state.last_refreshed = None;
    }

    async fn refresh(&self) -> Result<RefreshSummary, DashboardError> {
        let _guard = self.refresh_lock.lock().await;
        let epoch = self.session.epoch();
        let profile = self
            .session
            .profile()
            .ok_or(DashboardError::NotAuthenticated)?;
        if profile.needs_setup {
            return Err(DashboardError::SetupRequired);
        }

        let kind = DashboardKind::for_role(profile.role);
        let endpoint = kind.endpoint();
        let ctx = LogContext::operation("dashboard.refresh")
            .with_user(&profile.id)
            .with_role(profile.role.as_ref())
            .with_endpoint(endpoint);
        let params = json!({
            "user_id": profile.id,
            "role": profile.role,
            "department": profile.department,
            "production_line": profile.production_line,
        });
        let data = match self.session.remote().rpc(endpoint, params).await {
            Ok(data) => data,
            Err(err) => {
                fwm_warn!(context = ctx, "dashboard fetch failed: {err}");
                return Err(err.into());
            }
        };
        let Value::Object(data) = data else {
            fwm_warn!(context = ctx, "dashboard payload is not an object");
            return Err(DashboardError::InvalidPayload { endpoint });
        };

        if self.session.epoch() != epoch {
            fwm_debug!(context = ctx, "session changed during refresh; discarding payload");
            return Ok(RefreshSummary::default());
        }

        let summary = {
            let mut state = self.state.write();
            if state.kind != Some(kind) {
                state.widgets.clear();
                state.kind = Some(kind);
            }
            let summary = state.widgets.apply(&data, Utc::now());
            state.revision += 1;
            state.last_refreshed = Some(Utc::now());
            summary
        };
        fwm_info!(
            context = ctx,
            "dashboard refreshed: {} created, {} updated, {} removed",
            summary.created,
            summary.updated,
            summary.removed
        );
        Ok(summary)
    }
}
