//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Backend client facade and wire normalisation."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::types::{ChangeHandler, RowChange, RowFilter, SubscriptionHandle, SubscriptionKey};

#[derive(Clone)]
struct Entry {
    id: u64,
    filter: Option<RowFilter>,
    handler: ChangeHandler,
}

/// Registered realtime subscription, as seen by transports that need to
/// (re)join channels.
#[derive(Debug, Clone)]
pub struct ActiveSubscription {
    pub key: SubscriptionKey,
    pub filter: Option<RowFilter>,
}

/// One handler per (table, change kind). Inserting with an existing key
/// replaces the previous handler.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<SubscriptionKey, Entry>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler and return its handle plus the handle it replaced.
    pub fn insert(
        &self,
        key: SubscriptionKey,
        filter: Option<RowFilter>,
        handler: ChangeHandler,
    ) -> (SubscriptionHandle, Option<SubscriptionHandle>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let replaced = self
            .entries
            .lock()
            .insert(
                key.clone(),
                Entry {
                    id,
                    filter,
                    handler,
                },
            )
            .map(|previous| SubscriptionHandle {
                id: previous.id,
                key: key.clone(),
            });
        if let Some(previous) = &replaced {
            debug!(key = %key, previous = previous.id, "replaced realtime subscription");
        }
        (SubscriptionHandle { id, key }, replaced)
    }

    /// Remove the subscription identified by `handle`. A stale handle whose key
    /// has since been re-subscribed leaves the newer entry untouched.
    pub fn remove(&self, handle: &SubscriptionHandle) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(&handle.key) {
            Some(entry) if entry.id == handle.id => {
                entries.remove(&handle.key);
                true
            }
            _ => false,
        }
    }

    /// Remove every subscription, returning the released keys.
    pub fn clear(&self) -> Vec<SubscriptionKey> {
        self.entries.lock().drain().map(|(key, _)| key).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn active(&self) -> Vec<ActiveSubscription> {
        self.entries
            .lock()
            .iter()
            .map(|(key, entry)| ActiveSubscription {
                key: key.clone(),
                filter: entry.filter.clone(),
            })
            .collect()
    }

    /// Deliver `change` to every matching handler. Handlers run outside the
    /// registry lock; a panicking handler is logged and skipped.
    pub fn dispatch(&self, change: &RowChange) -> usize {
        let matching: Vec<(SubscriptionKey, ChangeHandler)> = self
            .entries
            .lock()
            .iter()
            .filter(|(key, entry)| {
                key.table == change.table
                    && key.kind.accepts(change.kind)
                    && entry
                        .filter
                        .as_ref()
                        .map_or(true, |filter| filter.matches(change.subject()))
            })
            .map(|(key, entry)| (key.clone(), entry.handler.clone()))
            .collect();

        let mut delivered = 0;
        for (key, handler) in matching {
            match catch_unwind(AssertUnwindSafe(|| handler(change))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(key = %key, "realtime handler panicked"),
            }
        }
        delivered
    }
}
