//! ---
//! fwm_section: "12-dashboard-presentation"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Role-scoped dashboard data, polling and actions."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Stable identifier of a rendered widget. Survives data refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WidgetHandle(u64);

impl WidgetHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Widget {
    pub name: String,
    pub handle: WidgetHandle,
    /// Incremented whenever the widget's data changes.
    pub revision: u64,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

/// What a refresh did to the widget map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Widgets keyed by name, in the order the backend first reported them.
#[derive(Debug, Default)]
pub struct WidgetMap {
    widgets: IndexMap<String, Widget>,
    next_handle: u64,
}

impl WidgetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fresh payload: existing widgets are updated in place, new
    /// names get a handle, names missing from `data` are dropped.
    pub fn apply(&mut self, data: &serde_json::Map<String, Value>, now: DateTime<Utc>) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let before = self.widgets.len();
        self.widgets.retain(|name, _| data.contains_key(name));
        summary.removed = before - self.widgets.len();

        for (name, value) in data {
            match self.widgets.get_mut(name) {
                Some(widget) if widget.data == *value => summary.unchanged += 1,
                Some(widget) => {
                    widget.data = value.clone();
                    widget.revision += 1;
                    widget.updated_at = now;
                    summary.updated += 1;
                }
                None => {
                    self.next_handle += 1;
                    self.widgets.insert(
                        name.clone(),
                        Widget {
                            name: name.clone(),
                            handle: WidgetHandle(self.next_handle),
                            revision: 1,
                            data: value.clone(),
                            updated_at: now,
                        },
                    );
                    summary.created += 1;
                }
            }
        }
        summary
    }

    pub fn get(&self, name: &str) -> Option<&Widget> {
        self.widgets.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.values()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn clear(&mut self) {
        self.widgets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    #[test]
    fn refresh_updates_in_place_and_keeps_handles() {
        let mut map = WidgetMap::new();
        let now = Utc::now();
        let first = map.apply(
            &payload(json!({"hours_today": 4, "open_issues": 2, "output": [1, 2]})),
            now,
        );
        assert_eq!(first.created, 3);
        let handle = map.get("open_issues").unwrap().handle;

        let second = map.apply(&payload(json!({"hours_today": 4, "open_issues": 3})), now);
        assert_eq!(
            second,
            RefreshSummary {
                created: 0,
                updated: 1,
                unchanged: 1,
                removed: 1
            }
        );
        let issues = map.get("open_issues").unwrap();
        assert_eq!(issues.handle, handle);
        assert_eq!(issues.revision, 2);
        assert_eq!(map.get("hours_today").unwrap().revision, 1);
        assert!(map.get("output").is_none());
        let names: Vec<_> = map.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["hours_today", "open_issues"]);
    }
}
