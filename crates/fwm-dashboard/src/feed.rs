//! ---
//! fwm_section: "12-dashboard-presentation"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Role-scoped dashboard data, polling and actions."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::collections::VecDeque;

use serde_json::Value;

/// Bounded notification list, newest first.
#[derive(Debug)]
pub struct NotificationFeed {
    entries: VecDeque<Value>,
    capacity: usize,
}

impl NotificationFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Add a notification, evicting the oldest once full.
    pub fn push(&mut self, notification: Value) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(notification);
    }

    pub fn entries(&self) -> Vec<Value> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_newest_within_capacity() {
        let mut feed = NotificationFeed::new(2);
        for id in 1..=3 {
            feed.push(json!({ "id": id }));
        }
        assert_eq!(feed.entries(), vec![json!({"id": 3}), json!({"id": 2})]);
        assert_eq!(NotificationFeed::new(0).capacity, 1);
    }
}
