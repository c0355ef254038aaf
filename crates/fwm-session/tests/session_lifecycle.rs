//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use fwm_common::{LocalStore, MemoryStore};
use fwm_remote::{
    AuthEvent, AuthFailureKind, ChangeKind, Filter, InMemoryBackend, Operation, RemoteClient,
    RemoteError, SubscriptionKey,
};
use fwm_session::messages;
use fwm_session::{
    EventKind, Locale, LoginFailureReason, Navigator, ProfileUpdate, RecordingNavigator, Role,
    RoutingTarget, SessionConfig, SessionContext, SessionError, SessionEvent, SessionMetrics,
    SessionState, NOTIFICATIONS_TABLE, PROFILES_TABLE,
};
use parking_lot::Mutex;
use prometheus::Registry;
use serde_json::json;

const PASSWORD: &str = "line-shift-42";

struct Harness {
    backend: Arc<InMemoryBackend>,
    store: Arc<MemoryStore>,
    navigator: Arc<RecordingNavigator>,
    session: SessionContext,
}

fn harness_with(config: SessionConfig) -> Harness {
    let backend = Arc::new(InMemoryBackend::new());
    let store = Arc::new(MemoryStore::new());
    let navigator = Arc::new(RecordingNavigator::new("/dashboard/agent"));
    let metrics = SessionMetrics::new(Arc::new(Registry::new())).unwrap();
    let session = SessionContext::builder(backend.clone(), store.clone())
        .navigator(navigator.clone())
        .config(config)
        .metrics(metrics)
        .build();
    Harness {
        backend,
        store,
        navigator,
        session,
    }
}

fn harness() -> Harness {
    harness_with(SessionConfig::default())
}

fn seed_profile(backend: &InMemoryBackend, id: &str, email: &str, role: Role) {
    backend.seed_row(
        PROFILES_TABLE,
        json!({
            "id": id,
            "email": email,
            "full_name": "Dana Okafor",
            "role": role,
            "department": "assembly",
            "needs_setup": false,
            "managed_departments": ["assembly"],
        }),
    );
}

fn record_events(session: &SessionContext, kind: EventKind) -> Arc<Mutex<Vec<SessionEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    session.add_listener(kind, move |event| {
        sink.lock().push(event.clone());
        Ok(())
    });
    seen
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_login_creates_default_profile_and_second_reuses_it() {
    let h = harness();
    let identity = h.backend.register_user("new.hire@factory.test", PASSWORD);

    let profile = h
        .session
        .login("new.hire@factory.test", PASSWORD)
        .await
        .unwrap();
    assert_eq!(profile.id, identity.id);
    assert_eq!(profile.role, Role::Agent);
    assert!(profile.needs_setup);
    assert_eq!(
        h.session.state(),
        SessionState::Authenticated { needs_setup: true }
    );
    assert_eq!(h.session.routing_target(), RoutingTarget::Setup);
    assert_eq!(h.backend.rows(PROFILES_TABLE).len(), 1);

    h.session.logout().await;
    let again = h
        .session
        .login("new.hire@factory.test", PASSWORD)
        .await
        .unwrap();
    assert_eq!(again.id, identity.id);
    assert_eq!(h.backend.rows(PROFILES_TABLE).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_publishes_profile_and_caches_it() {
    let h = harness();
    let identity = h.backend.register_user("lead@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "lead@factory.test", Role::TeamLead);
    let signed_in = record_events(&h.session, EventKind::SignedIn);

    let profile = h.session.login("lead@factory.test", PASSWORD).await.unwrap();

    assert_eq!(profile.role, Role::TeamLead);
    assert_eq!(h.session.profile(), Some(profile.clone()));
    assert_eq!(h.session.cached_profile(), Some(profile.clone()));
    assert_eq!(
        h.session.routing_target(),
        RoutingTarget::Dashboard(Role::TeamLead)
    );
    assert_eq!(*signed_in.lock(), vec![SessionEvent::SignedIn(profile)]);
    assert!(h.session.has_permission(Role::TeamLead));
    assert!(!h.session.has_permission(Role::Supervisor));
    assert!(h.session.can_manage_department("assembly"));
    assert!(!h.session.can_manage_department("packaging"));
    assert!(h.session.can_manage_user("someone-else", Role::Agent));
    assert!(!h.session.can_manage_user(&identity.id, Role::Agent));
    assert!(h.session.is_refresh_timer_running());
    assert!(h
        .backend
        .has_subscription(&SubscriptionKey::new(PROFILES_TABLE, ChangeKind::Update)));
    assert!(h
        .backend
        .has_subscription(&SubscriptionKey::new(NOTIFICATIONS_TABLE, ChangeKind::Insert)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn logout_keeps_only_preferences_and_releases_subscriptions() {
    let h = harness();
    let identity = h.backend.register_user("agent@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "agent@factory.test", Role::Agent);
    h.store.set("language", "fr".into()).unwrap();
    h.store.set("theme", "dark".into()).unwrap();
    let signed_out = record_events(&h.session, EventKind::SignedOut);
    let notifications = record_events(&h.session, EventKind::NewNotification);

    h.session.login("agent@factory.test", PASSWORD).await.unwrap();
    assert!(h.store.get("user_profile").is_some());

    h.session.logout().await;

    let mut keys = h.store.keys();
    keys.sort();
    assert_eq!(keys, vec!["language", "theme"]);
    assert_eq!(h.session.state(), SessionState::Unauthenticated);
    assert!(h.session.profile().is_none());
    assert!(h.session.cached_profile().is_none());
    assert!(!h.session.is_refresh_timer_running());
    assert_eq!(h.backend.active_subscriptions(), 0);
    assert_eq!(h.session.subscription_count(), 0);
    assert_eq!(h.navigator.history().last().map(String::as_str), Some("/login"));
    assert_eq!(signed_out.lock().len(), 1);

    h.backend.apply_external_insert(
        NOTIFICATIONS_TABLE,
        json!({"target_user_id": identity.id, "message": "late"}),
    );
    assert!(notifications.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn logout_does_not_navigate_when_already_on_login() {
    let h = harness();
    h.navigator.navigate("/login");
    let before = h.navigator.navigations();
    let signed_out = record_events(&h.session, EventKind::SignedOut);

    h.session.logout().await;

    assert_eq!(h.navigator.navigations(), before);
    assert!(signed_out.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sign_out_during_profile_load_discards_the_late_result() {
    let h = harness();
    let identity = h.backend.register_user("night@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "night@factory.test", Role::Supervisor);
    h.backend.set_read_latency(Some(Duration::from_millis(200)));

    let session = h.session.clone();
    let login = tokio::spawn(async move { session.login("night@factory.test", PASSWORD).await });
    assert!(wait_for(|| h.session.state() == SessionState::Authenticating).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.backend.emit_auth_event(AuthEvent::SignedOut);

    let outcome = login.await.unwrap();
    let failure = outcome.unwrap_err();
    assert_eq!(failure.reason, LoginFailureReason::Profile);
    assert_eq!(h.session.state(), SessionState::Unauthenticated);
    assert!(h.session.profile().is_none());
    assert!(h.session.cached_profile().is_none());
    assert!(h.store.get("user_profile").is_none());
    assert!(h.session.metrics().unwrap().stale_profile_loads() >= 1);
    assert!(!h.session.is_refresh_timer_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_sign_in_overtaken_by_sign_out_is_discarded() {
    let h = harness();
    let identity = h.backend.register_user("tablet@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "tablet@factory.test", Role::Agent);
    h.session.initialize().await.unwrap();
    let signed_in = record_events(&h.session, EventKind::SignedIn);
    h.backend.set_read_latency(Some(Duration::from_millis(200)));

    h.backend
        .sign_in_with_password("tablet@factory.test", PASSWORD)
        .await
        .unwrap();
    assert!(wait_for(|| h.session.state() == SessionState::Authenticating).await);
    h.backend.emit_auth_event(AuthEvent::SignedOut);
    assert!(wait_for(|| h.session.state() == SessionState::Unauthenticated).await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.session.state(), SessionState::Unauthenticated);
    assert!(h.session.profile().is_none());
    assert!(h.session.cached_profile().is_none());
    assert!(h.store.get("user_profile").is_none());
    assert!(signed_in.lock().is_empty());
    assert!(h.session.metrics().unwrap().stale_profile_loads() >= 1);
    assert!(!h.session.is_refresh_timer_running());
    assert_eq!(h.session.subscription_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn wrong_password_keeps_the_live_session() {
    let h = harness();
    let identity = h.backend.register_user("lead@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "lead@factory.test", Role::TeamLead);
    let signed_out = record_events(&h.session, EventKind::SignedOut);

    let profile = h.session.login("lead@factory.test", PASSWORD).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let subscriptions = h.session.subscription_count();
    let epoch = h.session.epoch();
    assert!(subscriptions > 0);

    let failure = h
        .session
        .login("lead@factory.test", "typo")
        .await
        .unwrap_err();
    assert_eq!(
        failure.reason,
        LoginFailureReason::Auth(AuthFailureKind::InvalidCredentials)
    );
    assert_eq!(
        h.session.state(),
        SessionState::Authenticated { needs_setup: false }
    );
    assert_eq!(h.session.epoch(), epoch);
    assert_eq!(h.session.profile(), Some(profile.clone()));
    assert_eq!(h.session.cached_profile(), Some(profile));
    assert_eq!(h.session.subscription_count(), subscriptions);
    assert!(h.session.is_refresh_timer_running());
    assert!(h.session.has_permission(Role::TeamLead));
    assert!(signed_out.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backend_outage_during_sign_in_is_a_network_failure() {
    let h = harness();
    h.backend.register_user("known@factory.test", PASSWORD);
    h.backend.fail_next(
        Operation::SignIn,
        RemoteError::rejected(503, Some("upstream unavailable".into())),
    );

    let failure = h
        .session
        .login("known@factory.test", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(failure.reason, LoginFailureReason::Network);
    assert_eq!(failure.message, messages::network_message(Locale::En));
    assert_eq!(h.session.state(), SessionState::Unauthenticated);

    h.session.login("known@factory.test", PASSWORD).await.unwrap();
    assert!(h.session.state().is_authenticated());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_revocation_does_not_swallow_a_later_remote_sign_out() {
    let h = harness();
    let identity = h.backend.register_user("agent@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "agent@factory.test", Role::Agent);
    let signed_out = record_events(&h.session, EventKind::SignedOut);

    h.session.login("agent@factory.test", PASSWORD).await.unwrap();
    h.backend.fail_next(
        Operation::SignOut,
        RemoteError::Transport("connection reset".into()),
    );
    h.session.logout().await;
    assert_eq!(h.session.state(), SessionState::Unauthenticated);
    assert_eq!(signed_out.lock().len(), 1);

    h.session.login("agent@factory.test", PASSWORD).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.session.state().is_authenticated());

    // Revoked from another device.
    h.backend.emit_auth_event(AuthEvent::SignedOut);
    assert!(wait_for(|| h.session.state() == SessionState::Unauthenticated).await);
    assert!(h.session.profile().is_none());
    assert!(h.session.cached_profile().is_none());
    assert_eq!(h.session.subscription_count(), 0);
    assert!(wait_for(|| signed_out.lock().len() == 2).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn update_profile_round_trips_and_emits_once() {
    let h = harness();
    let identity = h.backend.register_user("setup@factory.test", PASSWORD);
    h.session.login("setup@factory.test", PASSWORD).await.unwrap();
    let updates = record_events(&h.session, EventKind::ProfileUpdated);

    let updated = h
        .session
        .update_profile(ProfileUpdate {
            full_name: Some("Rui Mendes".into()),
            department: Some("welding".into()),
            production_line: Some("L3".into()),
            needs_setup: Some(false),
            ..ProfileUpdate::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.full_name.as_deref(), Some("Rui Mendes"));
    assert_eq!(updated.id, identity.id);
    assert!(updated.updated_at.is_some());
    assert_eq!(h.session.profile(), Some(updated.clone()));
    assert_eq!(h.session.cached_profile(), Some(updated.clone()));
    assert_eq!(
        h.session.state(),
        SessionState::Authenticated { needs_setup: false }
    );
    assert_eq!(*updates.lock(), vec![SessionEvent::ProfileUpdated(updated)]);
    let stored = h.backend.rows(PROFILES_TABLE);
    assert_eq!(stored[0]["production_line"], "L3");
}

#[tokio::test]
async fn update_profile_requires_a_session() {
    let h = harness();
    let err = h
        .session
        .update_profile(ProfileUpdate {
            full_name: Some("Nobody".into()),
            ..ProfileUpdate::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotAuthenticated));
    assert!(!h.backend.calls().iter().any(|call| call.starts_with("update")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_failures_carry_localized_messages() {
    let h = harness();
    h.backend.register_user("known@factory.test", PASSWORD);
    h.backend
        .register_unconfirmed_user("pending@factory.test", PASSWORD);

    let wrong = h
        .session
        .login("known@factory.test", "not-it")
        .await
        .unwrap_err();
    assert_eq!(
        wrong.reason,
        LoginFailureReason::Auth(AuthFailureKind::InvalidCredentials)
    );
    assert_eq!(
        wrong.message,
        messages::auth_message(&AuthFailureKind::InvalidCredentials, Locale::En)
    );

    let pending = h
        .session
        .login("pending@factory.test", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(
        pending.reason,
        LoginFailureReason::Auth(AuthFailureKind::EmailNotConfirmed)
    );

    h.backend.fail_next(
        Operation::SignIn,
        RemoteError::Transport("connection refused".into()),
    );
    let offline = h
        .session
        .login("known@factory.test", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(offline.reason, LoginFailureReason::Network);
    assert_eq!(offline.message, messages::network_message(Locale::En));

    assert_eq!(h.session.state(), SessionState::Unauthenticated);
    assert_eq!(h.session.metrics().unwrap().listener_faults(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn profile_load_failure_reverts_to_unauthenticated() {
    let h = harness();
    h.backend.register_user("known@factory.test", PASSWORD);
    h.backend.fail_next(
        Operation::SelectSingle,
        RemoteError::rejected(500, Some("database unavailable".into())),
    );

    let failure = h
        .session
        .login("known@factory.test", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(failure.reason, LoginFailureReason::Profile);
    assert_eq!(failure.message, messages::generic_message(Locale::En));
    assert_eq!(h.session.state(), SessionState::Unauthenticated);
    assert!(h.session.profile().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn french_locale_changes_failure_text() {
    let config = SessionConfig {
        locale: Locale::Fr,
        ..SessionConfig::default()
    };
    let h = harness_with(config);
    let failure = h
        .session
        .login("ghost@factory.test", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(
        failure.message,
        messages::auth_message(&AuthFailureKind::InvalidCredentials, Locale::Fr)
    );
    assert_ne!(
        failure.message,
        messages::auth_message(&AuthFailureKind::InvalidCredentials, Locale::En)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initialize_restores_once_and_is_idempotent() {
    let h = harness();
    let identity = h.backend.register_user("restore@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "restore@factory.test", Role::Director);
    h.backend
        .sign_in_with_password("restore@factory.test", PASSWORD)
        .await
        .unwrap();
    let signed_in = record_events(&h.session, EventKind::SignedIn);

    let state = h.session.initialize().await.unwrap();
    assert_eq!(state, SessionState::Authenticated { needs_setup: false });
    let again = h.session.initialize().await.unwrap();
    assert_eq!(again, state);

    let restores = h
        .backend
        .calls()
        .iter()
        .filter(|call| call.starts_with("current_session"))
        .count();
    assert_eq!(restores, 1);
    assert_eq!(signed_in.lock().len(), 1);
    assert_eq!(
        h.session.routing_target(),
        RoutingTarget::Dashboard(Role::Director)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initialize_without_session_stays_unauthenticated() {
    let h = harness();
    assert_eq!(
        h.session.initialize().await.unwrap(),
        SessionState::Unauthenticated
    );
    assert_eq!(h.session.routing_target(), RoutingTarget::Login);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_sign_in_event_loads_profile() {
    let h = harness();
    let identity = h.backend.register_user("tablet@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "tablet@factory.test", Role::Agent);
    h.session.initialize().await.unwrap();
    let signed_in = record_events(&h.session, EventKind::SignedIn);

    // Another client signs in against the same backend.
    h.backend
        .sign_in_with_password("tablet@factory.test", PASSWORD)
        .await
        .unwrap();

    assert!(wait_for(|| h.session.state().is_authenticated()).await);
    assert!(wait_for(|| signed_in.lock().len() == 1).await);
    assert_eq!(h.session.identity().map(|i| i.id), Some(identity.id));

    h.backend.emit_auth_event(AuthEvent::UserDeleted);
    assert!(wait_for(|| h.session.state() == SessionState::Unauthenticated).await);
    assert!(h.session.cached_profile().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn realtime_profile_changes_reach_listeners() {
    let h = harness();
    let identity = h.backend.register_user("agent@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "agent@factory.test", Role::Agent);
    h.session.login("agent@factory.test", PASSWORD).await.unwrap();
    let updates = record_events(&h.session, EventKind::ProfileUpdated);

    let changed = h.backend.apply_external_update(
        PROFILES_TABLE,
        &[Filter::eq("id", identity.id.as_str())],
        json!({"role": "team_lead", "shift": "night"}),
    );
    assert_eq!(changed, 1);

    let profile = h.session.profile().unwrap();
    assert_eq!(profile.role, Role::TeamLead);
    assert_eq!(profile.shift.as_deref(), Some("night"));
    assert_eq!(updates.lock().len(), 1);
    assert!(h.session.has_permission(Role::TeamLead));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn notifications_for_user_and_role_are_forwarded() {
    let h = harness();
    let identity = h.backend.register_user("agent@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "agent@factory.test", Role::Agent);
    h.session.login("agent@factory.test", PASSWORD).await.unwrap();
    let notifications = record_events(&h.session, EventKind::NewNotification);

    h.backend.apply_external_insert(
        NOTIFICATIONS_TABLE,
        json!({"target_user_id": identity.id, "message": "badge ready"}),
    );
    h.backend.apply_external_insert(
        NOTIFICATIONS_TABLE,
        json!({"target_role": "agent", "message": "line 2 stopped"}),
    );
    h.backend.apply_external_insert(
        NOTIFICATIONS_TABLE,
        json!({"target_role": "director", "message": "quarterly review"}),
    );

    let seen = notifications.lock();
    assert_eq!(seen.len(), 2);
    assert!(matches!(
        &seen[1],
        SessionEvent::NewNotification(row) if row["message"] == "line 2 stopped"
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_listener_does_not_block_others() {
    let h = harness();
    let identity = h.backend.register_user("agent@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "agent@factory.test", Role::Agent);
    h.session
        .add_listener(EventKind::SignedIn, |_| Err(anyhow!("widget not mounted")));
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = reached.clone();
    h.session.add_listener(EventKind::SignedIn, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    h.session.login("agent@factory.test", PASSWORD).await.unwrap();

    assert_eq!(reached.load(Ordering::SeqCst), 1);
    assert_eq!(h.session.metrics().unwrap().listener_faults(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_timer_runs_while_signed_in_only() {
    let config = SessionConfig {
        refresh_interval: Duration::from_secs(60),
        ..SessionConfig::default()
    };
    let h = harness_with(config);
    let identity = h.backend.register_user("agent@factory.test", PASSWORD);
    seed_profile(&h.backend, &identity.id, "agent@factory.test", Role::Agent);
    let refreshes = |backend: &InMemoryBackend| {
        backend
            .calls()
            .iter()
            .filter(|call| call.starts_with("refresh"))
            .count()
    };

    h.session.login("agent@factory.test", PASSWORD).await.unwrap();
    assert_eq!(refreshes(h.backend.as_ref()), 0);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(refreshes(h.backend.as_ref()), 1);

    h.session.logout().await;
    assert!(!h.session.is_refresh_timer_running());
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(refreshes(h.backend.as_ref()), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn register_reports_duplicates_and_weak_passwords() {
    let h = harness();
    h.backend.register_user("taken@factory.test", PASSWORD);

    let identity = h
        .session
        .register("fresh@factory.test", PASSWORD)
        .await
        .unwrap();
    assert_eq!(identity.email, "fresh@factory.test");

    let duplicate = h
        .session
        .register("taken@factory.test", PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(
        duplicate.reason,
        LoginFailureReason::Auth(AuthFailureKind::AlreadyRegistered)
    );

    let weak = h
        .session
        .register("other@factory.test", "123")
        .await
        .unwrap_err();
    assert_eq!(
        weak.reason,
        LoginFailureReason::Auth(AuthFailureKind::WeakPassword)
    );
}
