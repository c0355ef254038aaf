//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! The session holder: who is signed in, with which profile.
//!
//! A [`SessionContext`] is constructed explicitly and handed to consumers.
//! It reconciles local state with the auth subsystem through three paths:
//! direct calls (`initialize`, `login`, `logout`, `update_profile`), the
//! auth-event pump, and realtime row changes.
//!
//! Every profile load captures the session epoch when it starts. Tearing a
//! session down advances the epoch, so a load that completes afterwards is
//! discarded instead of resurrecting the old profile.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use fwm_common::{LocalStore, SessionSettings};
use fwm_logging::{fwm_debug, fwm_info, fwm_warn, log_operation_event, LogContext, OperationOutcome};
use fwm_remote::{
    AuthEvent, ChangeHandler, ChangeKind, Filter, Identity, Query, RemoteClient, RemoteError,
    RowChange, RowFilter, SubscriptionHandle, SubscriptionKey,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::cache::ProfileCache;
use crate::error::{LoginFailure, LoginFailureReason, SessionError};
use crate::events::{DispatchReport, EventKind, EventRegistry, ListenerId, SessionEvent};
use crate::messages::{self, Locale};
use crate::metrics::SessionMetrics;
use crate::navigator::{Navigator, RecordingNavigator};
use crate::permissions;
use crate::profile::{Profile, ProfileUpdate, PROFILES_TABLE};
use crate::role::Role;
use crate::state::{RoutingTarget, SessionState};

/// Table carrying user and role notifications.
pub const NOTIFICATIONS_TABLE: &str = "notifications";

/// Session holder settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub login_route: String,
    pub refresh_interval: Duration,
    /// Local keys that survive logout.
    pub preserved_keys: Vec<String>,
    pub locale: Locale,
}

impl SessionConfig {
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            login_route: settings.login_route.clone(),
            refresh_interval: settings.refresh_interval,
            preserved_keys: settings.preserved_keys.clone(),
            locale: Locale::from_tag(&settings.locale),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&SessionSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOrigin {
    Restore,
    Login,
    AuthEvent,
    Reload,
}

impl LoadOrigin {
    fn operation(self) -> &'static str {
        match self {
            LoadOrigin::Restore => "initialize",
            LoadOrigin::Login => "login",
            LoadOrigin::AuthEvent => "auth_event",
            LoadOrigin::Reload => "reload_profile",
        }
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    state: SessionState,
    identity: Option<Identity>,
    profile: Option<Profile>,
}

/// What changed when a profile was applied.
#[derive(Debug, Clone, Copy)]
struct Applied {
    new_session: bool,
    changed: bool,
    role_changed: bool,
}

#[derive(Default)]
struct Tasks {
    auth_pump: Option<JoinHandle<()>>,
    refresh: Option<JoinHandle<()>>,
}

struct Inner {
    remote: Arc<dyn RemoteClient>,
    cache: ProfileCache,
    navigator: Arc<dyn Navigator>,
    config: SessionConfig,
    events: EventRegistry,
    metrics: Option<SessionMetrics>,
    snapshot: RwLock<Snapshot>,
    epoch: AtomicU64,
    /// Sign-out events the pump should ignore because `logout` already tore down.
    own_sign_outs: AtomicUsize,
    /// Credential checks that have not yet started their generation.
    pending_logins: AtomicUsize,
    load_lock: tokio::sync::Mutex<()>,
    initialized: tokio::sync::Mutex<bool>,
    tasks: Mutex<Tasks>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
}

/// Builder used to configure a [`SessionContext`].
pub struct SessionBuilder {
    remote: Arc<dyn RemoteClient>,
    store: Arc<dyn LocalStore>,
    navigator: Option<Arc<dyn Navigator>>,
    config: SessionConfig,
    metrics: Option<SessionMetrics>,
}

impl SessionBuilder {
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metrics(mut self, metrics: SessionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> SessionContext {
        let navigator = self
            .navigator
            .unwrap_or_else(|| {
                Arc::new(RecordingNavigator::new(&self.config.login_route)) as Arc<dyn Navigator>
            });
        SessionContext {
            inner: Arc::new(Inner {
                remote: self.remote,
                cache: ProfileCache::new(self.store),
                navigator,
                config: self.config,
                events: EventRegistry::new(),
                metrics: self.metrics,
                snapshot: RwLock::new(Snapshot::default()),
                epoch: AtomicU64::new(0),
                own_sign_outs: AtomicUsize::new(0),
                pending_logins: AtomicUsize::new(0),
                load_lock: tokio::sync::Mutex::new(()),
                initialized: tokio::sync::Mutex::new(false),
                tasks: Mutex::new(Tasks::default()),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Process-wide source of truth for the signed-in identity and profile.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl SessionContext {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn LocalStore>,
        navigator: Arc<dyn Navigator>,
        config: SessionConfig,
    ) -> Self {
        Self::builder(remote, store)
            .navigator(navigator)
            .config(config)
            .build()
    }

    pub fn builder(remote: Arc<dyn RemoteClient>, store: Arc<dyn LocalStore>) -> SessionBuilder {
        SessionBuilder {
            remote,
            store,
            navigator: None,
            config: SessionConfig::default(),
            metrics: None,
        }
    }

    /// Restore an existing session, if any, and start listening for auth
    /// events. Repeated calls after a successful one are no-ops.
    pub async fn initialize(&self) -> Result<SessionState, SessionError> {
        let inner = &self.inner;
        let mut initialized = inner.initialized.lock().await;
        if *initialized {
            return Ok(self.state());
        }
        inner.start_auth_pump();

        let ctx = LogContext::operation("initialize");
        let epoch = inner.current_epoch();
        let session = match inner.remote.current_session().await {
            Ok(session) => session,
            Err(err) => {
                fwm_warn!(context = ctx, "session restore failed: {err}");
                return Err(err.into());
            }
        };

        let Some(session) = session else {
            fwm_debug!(context = ctx, "no stored session");
            *initialized = true;
            return Ok(self.state());
        };

        inner.mark_authenticating(epoch);
        match inner
            .load_and_apply(session.identity, epoch, LoadOrigin::Restore)
            .await
        {
            Ok(_) | Err(SessionError::Superseded(_)) => {
                *initialized = true;
                Ok(self.state())
            }
            Err(err) => {
                inner.revert_authenticating(epoch);
                Err(err)
            }
        }
    }

    /// Validate credentials and load the profile. Expected failures come back
    /// as a [`LoginFailure`] with a localized message; a rejected credential
    /// check leaves any signed-in session as it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<Profile, LoginFailure> {
        let inner = &self.inner;
        let ctx = LogContext::operation("login");
        if let Some(metrics) = &inner.metrics {
            metrics.inc_login_attempt();
        }
        inner.start_auth_pump();

        // The live session stays untouched until the credentials check out.
        inner.pending_logins.fetch_add(1, Ordering::SeqCst);
        let signed_in = inner.remote.sign_in_with_password(email, password).await;
        let session = match signed_in {
            Ok(session) => session,
            Err(err) => {
                inner.pending_logins.fetch_sub(1, Ordering::SeqCst);
                return Err(inner.login_failure(&ctx, &SessionError::from(err)));
            }
        };
        let epoch = inner.begin_generation();
        inner.pending_logins.fetch_sub(1, Ordering::SeqCst);

        match inner
            .load_and_apply(session.identity.clone(), epoch, LoadOrigin::Login)
            .await
        {
            Ok(profile) => {
                log_operation_event(
                    Some(&ctx.with_user(&profile.id).with_role(profile.role.as_ref())),
                    "session.login",
                    "signed in",
                    OperationOutcome::Success,
                );
                Ok(profile)
            }
            Err(err) => {
                inner.revert_authenticating(epoch);
                Err(inner.login_failure(&ctx.with_user(&session.identity.id), &err))
            }
        }
    }

    /// Register a new account. The account usually has to confirm its email
    /// before it can sign in.
    pub async fn register(&self, email: &str, password: &str) -> Result<Identity, LoginFailure> {
        let ctx = LogContext::operation("register");
        match self.inner.remote.sign_up(email, password).await {
            Ok(identity) => {
                fwm_info!(context = ctx.with_user(&identity.id), "account registered");
                Ok(identity)
            }
            Err(err) => Err(self.inner.login_failure(&ctx, &SessionError::from(err))),
        }
    }

    /// Revoke the session and drop all user-scoped local state.
    ///
    /// Realtime subscriptions are released before the backend is contacted,
    /// and the refresh timer is stopped. A failed revocation is logged; the
    /// local teardown happens regardless.
    pub async fn logout(&self) {
        let inner = &self.inner;
        let user = self.identity().map(|identity| identity.id);
        let ctx = LogContext::operation("logout");
        let ctx = match &user {
            Some(user) => ctx.with_user(user),
            None => ctx,
        };

        let had_session = inner.detach();
        if let Some(metrics) = &inner.metrics {
            metrics.inc_logout();
        }
        // The facade announces every sign-out, including this one.
        if inner.auth_pump_running() {
            inner.own_sign_outs.fetch_add(1, Ordering::SeqCst);
        }
        if let Err(err) = inner.remote.sign_out().await {
            log_operation_event(
                Some(&ctx),
                "session.logout",
                &format!("backend revocation failed: {err}"),
                OperationOutcome::Fault,
            );
        }
        inner.finish_teardown(had_session);
        log_operation_event(
            Some(&ctx),
            "session.logout",
            "session cleared",
            OperationOutcome::Success,
        );
    }

    /// Apply a partial update to the signed-in profile.
    ///
    /// Calling this without a session is a caller error and yields
    /// [`SessionError::NotAuthenticated`].
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Profile, SessionError> {
        let inner = &self.inner;
        let epoch = inner.current_epoch();
        let identity = self.identity().ok_or(SessionError::NotAuthenticated)?;
        let ctx = LogContext::operation("update_profile")
            .with_user(&identity.id)
            .with_endpoint(PROFILES_TABLE);

        if update.is_empty() {
            return self.profile().ok_or(SessionError::NotAuthenticated);
        }

        let patch = update.to_patch(Utc::now())?;
        let rows = inner
            .remote
            .update(PROFILES_TABLE, &[Filter::eq("id", identity.id.as_str())], patch)
            .await
            .map_err(|err| {
                fwm_warn!(context = ctx, "profile update failed: {err}");
                SessionError::from(err)
            })?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::Remote(RemoteError::NotFound(PROFILES_TABLE.to_owned())))?;
        let profile = Profile::from_row(row)?;

        let applied = inner
            .apply_profile(epoch, &identity, &profile)
            .ok_or(SessionError::Superseded("profile update"))?;
        inner.after_update(&profile, applied, epoch);
        fwm_info!(context = ctx, "profile updated");
        Ok(profile)
    }

    /// Re-read the signed-in profile from the backend.
    pub async fn reload_profile(&self) -> Result<Profile, SessionError> {
        let epoch = self.inner.current_epoch();
        let identity = self.identity().ok_or(SessionError::NotAuthenticated)?;
        self.inner
            .load_and_apply(identity, epoch, LoadOrigin::Reload)
            .await
    }

    /// Stop background work and release every subscription. The context
    /// stays usable for reads.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let tasks = std::mem::take(&mut *inner.tasks.lock());
        for task in [tasks.auth_pump, tasks.refresh].into_iter().flatten() {
            task.abort();
        }
        let released = inner.release_subscriptions();
        *inner.initialized.lock().await = false;
        fwm_debug!(
            context = LogContext::operation("shutdown"),
            "session shut down; released {released} subscriptions"
        );
    }

    pub fn state(&self) -> SessionState {
        self.inner.snapshot.read().state
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.snapshot.read().identity.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.inner.snapshot.read().profile.clone()
    }

    /// Last profile written to local storage. Fast to read but possibly stale.
    pub fn cached_profile(&self) -> Option<Profile> {
        self.inner.cache.load()
    }

    pub fn routing_target(&self) -> RoutingTarget {
        let snapshot = self.inner.snapshot.read();
        RoutingTarget::resolve(snapshot.state, snapshot.profile.as_ref())
    }

    pub fn has_permission(&self, required: Role) -> bool {
        permissions::has_permission(self.inner.snapshot.read().profile.as_ref(), required)
    }

    pub fn can_manage_department(&self, department: &str) -> bool {
        permissions::can_manage_department(self.inner.snapshot.read().profile.as_ref(), department)
    }

    pub fn can_manage_user(&self, target_id: &str, target_role: Role) -> bool {
        permissions::can_manage_user(
            self.inner.snapshot.read().profile.as_ref(),
            target_id,
            target_role,
        )
    }

    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.events.add_listener(kind, listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.events.remove_listener(id)
    }

    pub fn remote(&self) -> Arc<dyn RemoteClient> {
        self.inner.remote.clone()
    }

    pub fn locale(&self) -> Locale {
        self.inner.config.locale
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> Option<&SessionMetrics> {
        self.inner.metrics.as_ref()
    }

    /// Current session generation; advances on every sign-in and teardown.
    pub fn epoch(&self) -> u64 {
        self.inner.current_epoch()
    }

    pub fn is_refresh_timer_running(&self) -> bool {
        self.inner
            .tasks
            .lock()
            .refresh
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Realtime subscriptions currently held by the session.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }
}

impl Inner {
    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn record_stale(&self, operation: &str) {
        fwm_debug!(
            context = LogContext::operation(operation),
            "discarding result from a superseded session"
        );
        if let Some(metrics) = &self.metrics {
            metrics.inc_stale_profile_load();
        }
    }

    /// Start a new session generation for an explicit login. Any previous
    /// session is detached locally first.
    fn begin_generation(self: &Arc<Self>) -> u64 {
        let previous = self.snapshot.read().identity.is_some();
        if previous {
            self.detach();
        }
        let mut snapshot = self.snapshot.write();
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        snapshot.state = SessionState::Authenticating;
        epoch
    }

    fn mark_authenticating(&self, epoch: u64) {
        let mut snapshot = self.snapshot.write();
        if self.current_epoch() == epoch && !snapshot.state.is_authenticated() {
            snapshot.state = SessionState::Authenticating;
        }
    }

    fn revert_authenticating(&self, epoch: u64) {
        let mut snapshot = self.snapshot.write();
        if self.current_epoch() == epoch && snapshot.state == SessionState::Authenticating {
            snapshot.state = SessionState::Unauthenticated;
        }
    }

    fn current_profile_for(&self, identity: &Identity) -> Option<Profile> {
        let snapshot = self.snapshot.read();
        match (&snapshot.identity, &snapshot.profile) {
            (Some(current), Some(profile))
                if current.id == identity.id && snapshot.state.is_authenticated() =>
            {
                Some(profile.clone())
            }
            _ => None,
        }
    }

    fn login_failure(&self, ctx: &LogContext, err: &SessionError) -> LoginFailure {
        if let Some(metrics) = &self.metrics {
            metrics.inc_login_failure();
        }
        let locale = self.config.locale;
        let failure = match err {
            SessionError::Remote(RemoteError::Auth { kind, .. }) => LoginFailure {
                reason: LoginFailureReason::Auth(kind.clone()),
                message: messages::auth_message(kind, locale),
            },
            SessionError::Remote(remote) if remote.is_unavailable() => LoginFailure {
                reason: LoginFailureReason::Network,
                message: messages::network_message(locale).to_owned(),
            },
            _ => LoginFailure {
                reason: LoginFailureReason::Profile,
                message: messages::generic_message(locale).to_owned(),
            },
        };
        log_operation_event(
            Some(ctx),
            "session.login",
            &format!("login failed: {err}"),
            OperationOutcome::Fault,
        );
        failure
    }

    /// Fetch the profile row, creating a default one when none exists.
    async fn fetch_or_create(
        &self,
        identity: &Identity,
        epoch: u64,
    ) -> Result<Profile, SessionError> {
        let ctx = LogContext::operation("load_profile")
            .with_user(&identity.id)
            .with_endpoint(PROFILES_TABLE);
        let query = Query::new().eq("id", identity.id.as_str());
        match self.remote.select_single(PROFILES_TABLE, &query).await {
            Ok(row) => Profile::from_row(row),
            Err(err) if err.is_not_found() => {
                if self.current_epoch() != epoch {
                    self.record_stale("load_profile");
                    return Err(SessionError::Superseded("profile load"));
                }
                let profile = Profile::default_for(identity, Utc::now());
                let row = self
                    .remote
                    .insert(PROFILES_TABLE, profile.to_row()?)
                    .await
                    .map_err(|err| {
                        fwm_warn!(context = ctx, "default profile creation failed: {err}");
                        SessionError::from(err)
                    })?;
                fwm_info!(context = ctx, "created default profile");
                Profile::from_row(row)
            }
            Err(err) => {
                fwm_warn!(context = ctx, "profile load failed: {err}");
                Err(err.into())
            }
        }
    }

    /// Load, apply and (for a new session) wire up realtime and the refresh
    /// timer. Loads are serialized so concurrent sign-in paths see each
    /// other's writes.
    async fn load_and_apply(
        self: &Arc<Self>,
        identity: Identity,
        epoch: u64,
        origin: LoadOrigin,
    ) -> Result<Profile, SessionError> {
        let _guard = self.load_lock.lock().await;
        if origin == LoadOrigin::AuthEvent {
            if let Some(profile) = self.current_profile_for(&identity) {
                return Ok(profile);
            }
        }
        if self.current_epoch() != epoch {
            self.record_stale(origin.operation());
            return Err(SessionError::Superseded("profile load"));
        }

        let profile = self.fetch_or_create(&identity, epoch).await?;
        let Some(applied) = self.apply_profile(epoch, &identity, &profile) else {
            return Err(SessionError::Superseded("profile load"));
        };

        if applied.new_session {
            self.start_refresh_timer();
            self.subscribe_realtime(epoch, &profile).await;
            self.emit(SessionEvent::SignedIn(profile.clone()));
        } else {
            self.after_update(&profile, applied, epoch);
        }
        Ok(profile)
    }

    /// Install `profile` as the current one unless the epoch moved on.
    fn apply_profile(&self, epoch: u64, identity: &Identity, profile: &Profile) -> Option<Applied> {
        let mut snapshot = self.snapshot.write();
        if self.current_epoch() != epoch {
            drop(snapshot);
            self.record_stale("apply_profile");
            return None;
        }
        let same_identity = snapshot.state.is_authenticated()
            && snapshot
                .identity
                .as_ref()
                .is_some_and(|current| current.id == identity.id);
        let previous = snapshot.profile.take();
        let applied = Applied {
            new_session: !same_identity,
            changed: previous.as_ref() != Some(profile),
            role_changed: previous
                .as_ref()
                .is_some_and(|previous| previous.role != profile.role),
        };
        snapshot.identity = Some(identity.clone());
        snapshot.profile = Some(profile.clone());
        snapshot.state = SessionState::for_profile(profile);
        if let Err(err) = self.cache.store(profile) {
            fwm_warn!(
                context = LogContext::operation("cache_profile").with_user(&profile.id),
                "failed to cache profile: {err}"
            );
        }
        Some(applied)
    }

    fn after_update(self: &Arc<Self>, profile: &Profile, applied: Applied, epoch: u64) {
        if !applied.changed {
            return;
        }
        self.emit(SessionEvent::ProfileUpdated(profile.clone()));
        if applied.role_changed {
            // Role broadcasts are filtered by role; follow the new one.
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let inner = self.clone();
                let profile = profile.clone();
                runtime.spawn(async move {
                    inner.subscribe_notifications(epoch, &profile).await;
                });
            }
        }
    }

    fn emit(&self, event: SessionEvent) -> DispatchReport {
        let report = self.events.dispatch(&event);
        if report.faults > 0 {
            if let Some(metrics) = &self.metrics {
                metrics.add_listener_faults(report.faults);
            }
        }
        report
    }

    /// Clear in-memory state, stop the refresh timer and release realtime
    /// subscriptions. Returns whether a session was active.
    fn detach(&self) -> bool {
        let had_session = {
            let mut snapshot = self.snapshot.write();
            self.epoch.fetch_add(1, Ordering::SeqCst);
            let had = snapshot.identity.is_some() || snapshot.state != SessionState::Unauthenticated;
            *snapshot = Snapshot::default();
            had
        };
        self.stop_refresh_timer();
        self.release_subscriptions();
        had_session
    }

    /// Drop user-scoped local keys, announce the sign-out and route to login.
    fn finish_teardown(&self, had_session: bool) {
        match self.cache.clear_user_scope(&self.config.preserved_keys) {
            Ok(removed) if !removed.is_empty() => {
                fwm_debug!(
                    context = LogContext::operation("clear_cache"),
                    "removed {} cached keys",
                    removed.len()
                );
            }
            Ok(_) => {}
            Err(err) => fwm_warn!(
                context = LogContext::operation("clear_cache"),
                "failed to clear cached session state: {err}"
            ),
        }
        if had_session {
            self.emit(SessionEvent::SignedOut);
        }
        let current = self.navigator.current_route();
        if current != self.config.login_route {
            self.navigator.navigate(&self.config.login_route);
        }
    }

    fn release_subscriptions(&self) -> usize {
        let handles = std::mem::take(&mut *self.subscriptions.lock());
        for handle in &handles {
            self.remote.unsubscribe(handle);
        }
        let stray = self.remote.unsubscribe_all();
        handles.len() + stray
    }

    async fn subscribe_realtime(self: &Arc<Self>, epoch: u64, profile: &Profile) {
        let weak = Arc::downgrade(self);
        let handler: ChangeHandler = Arc::new(move |change: &RowChange| {
            if let Some(inner) = weak.upgrade() {
                inner.on_profile_change(epoch, change);
            }
        });
        self.subscribe_keyed(
            epoch,
            SubscriptionKey::new(PROFILES_TABLE, ChangeKind::Update),
            Some(RowFilter::eq("id", profile.id.as_str())),
            handler,
        )
        .await;
        self.subscribe_notifications(epoch, profile).await;
    }

    async fn subscribe_notifications(self: &Arc<Self>, epoch: u64, profile: &Profile) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let handler: ChangeHandler = Arc::new(move |change: &RowChange| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.current_epoch() == epoch {
                inner.emit(SessionEvent::NewNotification(change.new.clone()));
            }
        });
        let filter = RowFilter::AnyOf(vec![
            RowFilter::eq("target_user_id", profile.id.as_str()),
            RowFilter::eq("target_role", profile.role.as_ref()),
        ]);
        self.subscribe_keyed(
            epoch,
            SubscriptionKey::new(NOTIFICATIONS_TABLE, ChangeKind::Insert),
            Some(filter),
            handler,
        )
        .await;
    }

    /// Subscribe, releasing any handle this session holds for the same key
    /// first. A subscription that lands after the epoch moved is dropped.
    async fn subscribe_keyed(
        &self,
        epoch: u64,
        key: SubscriptionKey,
        filter: Option<RowFilter>,
        handler: ChangeHandler,
    ) {
        let previous: Vec<SubscriptionHandle> = {
            let mut held = self.subscriptions.lock();
            let (same, rest): (Vec<_>, Vec<_>) =
                held.drain(..).partition(|handle| *handle.key() == key);
            *held = rest;
            same
        };
        for handle in &previous {
            self.remote.unsubscribe(handle);
        }

        let ctx = LogContext::operation("subscribe").with_endpoint(&key.table);
        match self.remote.subscribe(key.clone(), filter, handler).await {
            Ok(handle) => {
                if self.current_epoch() == epoch {
                    self.subscriptions.lock().push(handle);
                } else {
                    self.remote.unsubscribe(&handle);
                }
            }
            Err(err) => fwm_warn!(context = ctx, "realtime subscription failed: {err}"),
        }
    }

    fn on_profile_change(self: &Arc<Self>, epoch: u64, change: &RowChange) {
        let ctx = LogContext::operation("profile_change").with_endpoint(PROFILES_TABLE);
        let profile = match Profile::from_row(change.new.clone()) {
            Ok(profile) => profile,
            Err(err) => {
                fwm_warn!(context = ctx, "ignoring undecodable profile change: {err}");
                return;
            }
        };
        let Some(identity) = self.snapshot.read().identity.clone() else {
            return;
        };
        if identity.id != profile.id {
            return;
        }
        if let Some(applied) = self.apply_profile(epoch, &identity, &profile) {
            self.after_update(&profile, applied, epoch);
        }
    }

    fn auth_pump_running(&self) -> bool {
        self.tasks
            .lock()
            .auth_pump
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn take_own_sign_out(&self) -> bool {
        self.own_sign_outs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                pending.checked_sub(1)
            })
            .is_ok()
    }

    fn start_auth_pump(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if tasks
            .auth_pump
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return;
        }
        let mut events = self.remote.auth_events();
        let weak = Arc::downgrade(self);
        tasks.auth_pump = Some(tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        fwm_warn!(
                            context = LogContext::operation("auth_event"),
                            "auth event stream lagged; {skipped} events skipped"
                        );
                        // Skipped events may include the echoes being waited on.
                        if let Some(inner) = weak.upgrade() {
                            inner.own_sign_outs.store(0, Ordering::SeqCst);
                        }
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.handle_auth_event(event);
            }
        }));
    }

    /// Reduce an auth lifecycle event to "load the profile" or "clear and
    /// redirect". Loads run on their own task so a later event can overtake them.
    fn handle_auth_event(self: &Arc<Self>, event: AuthEvent) {
        let ctx = LogContext::operation("auth_event");
        fwm_debug!(context = ctx, "auth event {}", event.name());
        match event {
            AuthEvent::SignedIn(session) | AuthEvent::UserUpdated(session) => {
                // Echoes of earlier sign-outs are always delivered ahead of this.
                self.own_sign_outs.store(0, Ordering::SeqCst);
                // An explicit login or restore is already loading this identity.
                if self.pending_logins.load(Ordering::SeqCst) > 0
                    || self.snapshot.read().state == SessionState::Authenticating
                {
                    return;
                }
                let epoch = self.current_epoch();
                self.mark_authenticating(epoch);
                let inner = self.clone();
                tokio::spawn(async move {
                    let user = session.identity.id.clone();
                    match inner
                        .load_and_apply(session.identity, epoch, LoadOrigin::AuthEvent)
                        .await
                    {
                        Ok(_) | Err(SessionError::Superseded(_)) => {}
                        Err(err) => {
                            inner.revert_authenticating(epoch);
                            fwm_warn!(
                                context = LogContext::operation("auth_event").with_user(&user),
                                "profile load after auth event failed: {err}"
                            );
                        }
                    }
                });
            }
            AuthEvent::SignedOut if self.take_own_sign_out() => {}
            AuthEvent::SignedOut | AuthEvent::UserDeleted => {
                let had_session = self.detach();
                self.finish_teardown(had_session);
            }
            AuthEvent::TokenRefreshed(_) => {}
        }
    }

    fn start_refresh_timer(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if tasks
            .refresh
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return;
        }
        let period = self.config.refresh_interval;
        let weak = Arc::downgrade(self);
        tasks.refresh = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let ctx = LogContext::operation("token_refresh");
                match inner.remote.refresh_session().await {
                    Ok(_) => fwm_debug!(context = ctx, "access token refreshed"),
                    Err(err) => fwm_warn!(context = ctx, "token refresh failed: {err}"),
                }
            }
        }));
    }

    fn stop_refresh_timer(&self) {
        if let Some(task) = self.tasks.lock().refresh.take() {
            task.abort();
        }
    }
}
