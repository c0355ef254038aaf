//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Typed publish/subscribe registry for session lifecycle events.
//!
//! Dispatch is synchronous and follows listener registration order. A
//! listener that returns an error or panics is logged and counted; the
//! remaining listeners still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use strum::{AsRefStr, Display};
use tracing::{debug, error};

use crate::profile::Profile;

/// Event names listeners can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum EventKind {
    SignedIn,
    SignedOut,
    ProfileUpdated,
    NewNotification,
}

/// Payload delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(Profile),
    SignedOut,
    ProfileUpdated(Profile),
    /// A notification row addressed to the user or to the user's role.
    NewNotification(Value),
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::SignedIn(_) => EventKind::SignedIn,
            SessionEvent::SignedOut => EventKind::SignedOut,
            SessionEvent::ProfileUpdated(_) => EventKind::ProfileUpdated,
            SessionEvent::NewNotification(_) => EventKind::NewNotification,
        }
    }
}

/// Listener callback. Returning an error marks a fault but does not stop dispatch.
pub type Listener = Arc<dyn Fn(&SessionEvent) -> anyhow::Result<()> + Send + Sync>;

/// Identifies a registered listener for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Result of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub faults: usize,
}

struct Registration {
    id: ListenerId,
    kind: EventKind,
    listener: Listener,
}

#[derive(Default)]
pub struct EventRegistry {
    listeners: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.listeners.write().push(Registration {
            id,
            kind,
            listener: Arc::new(listener),
        });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|registration| registration.kind == kind)
            .count()
    }

    /// Deliver `event` to every listener registered for its kind.
    ///
    /// Listeners are snapshotted before the first call, so a listener may
    /// add or remove listeners without deadlocking; changes apply to the
    /// next dispatch.
    pub fn dispatch(&self, event: &SessionEvent) -> DispatchReport {
        let kind = event.kind();
        let targets: Vec<(ListenerId, Listener)> = self
            .listeners
            .read()
            .iter()
            .filter(|registration| registration.kind == kind)
            .map(|registration| (registration.id, registration.listener.clone()))
            .collect();

        let mut report = DispatchReport::default();
        for (id, listener) in targets {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.faults += 1;
                    error!(event = %kind, listener = id.0, error = %format!("{err:#}"), "session listener failed");
                }
                Err(_) => {
                    report.faults += 1;
                    error!(event = %kind, listener = id.0, "session listener panicked");
                }
            }
        }
        debug!(event = %kind, delivered = report.delivered, faults = report.faults, "session event dispatched");
        report
    }
}
