//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use parking_lot::Mutex;

/// Route changes requested by the session holder.
pub trait Navigator: Send + Sync {
    fn current_route(&self) -> String;
    fn navigate(&self, route: &str);
}

/// Navigator that only remembers where it was sent. Used by the CLI and tests.
#[derive(Debug)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new(initial_route: &str) -> Self {
        Self {
            history: Mutex::new(vec![initial_route.to_owned()]),
        }
    }

    /// Every route visited, starting with the initial one.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    /// Number of navigations performed after construction.
    pub fn navigations(&self) -> usize {
        self.history.lock().len().saturating_sub(1)
    }
}

impl Default for RecordingNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for RecordingNavigator {
    fn current_route(&self) -> String {
        self.history.lock().last().cloned().unwrap_or_default()
    }

    fn navigate(&self, route: &str) {
        self.history.lock().push(route.to_owned());
    }
}
