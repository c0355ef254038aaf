//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use prometheus::{IntCounter, Registry};
use std::sync::Arc;

/// Session counters exported via Prometheus.
#[derive(Clone)]
pub struct SessionMetrics {
    registry: Arc<Registry>,
    login_attempts_total: IntCounter,
    login_failures_total: IntCounter,
    logouts_total: IntCounter,
    stale_profile_loads_total: IntCounter,
    listener_faults_total: IntCounter,
}

impl SessionMetrics {
    /// Register metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let login_attempts_total =
            IntCounter::new("fwm_login_attempts_total", "Total login attempts")?;
        let login_failures_total =
            IntCounter::new("fwm_login_failures_total", "Failed login attempts")?;
        let logouts_total = IntCounter::new("fwm_logouts_total", "Explicit logouts")?;
        let stale_profile_loads_total = IntCounter::new(
            "fwm_stale_profile_loads_total",
            "Profile loads discarded because the session changed underneath them",
        )?;
        let listener_faults_total = IntCounter::new(
            "fwm_listener_faults_total",
            "Session event listeners that failed or panicked",
        )?;

        registry.register(Box::new(login_attempts_total.clone()))?;
        registry.register(Box::new(login_failures_total.clone()))?;
        registry.register(Box::new(logouts_total.clone()))?;
        registry.register(Box::new(stale_profile_loads_total.clone()))?;
        registry.register(Box::new(listener_faults_total.clone()))?;

        Ok(Self {
            registry,
            login_attempts_total,
            login_failures_total,
            logouts_total,
            stale_profile_loads_total,
            listener_faults_total,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn inc_login_attempt(&self) {
        self.login_attempts_total.inc();
    }

    pub fn inc_login_failure(&self) {
        self.login_failures_total.inc();
    }

    pub fn inc_logout(&self) {
        self.logouts_total.inc();
    }

    pub fn inc_stale_profile_load(&self) {
        self.stale_profile_loads_total.inc();
    }

    pub fn add_listener_faults(&self, faults: usize) {
        self.listener_faults_total.inc_by(faults as u64);
    }

    pub fn stale_profile_loads(&self) -> u64 {
        self.stale_profile_loads_total.get()
    }

    pub fn listener_faults(&self) -> u64 {
        self.listener_faults_total.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_increment() {
        let registry = Arc::new(Registry::new());
        let metrics = SessionMetrics::new(registry.clone()).unwrap();
        metrics.inc_login_attempt();
        metrics.inc_login_failure();
        metrics.inc_logout();
        metrics.inc_stale_profile_load();
        metrics.add_listener_faults(2);
        assert_eq!(registry.gather().len(), 5);
        assert_eq!(metrics.listener_faults(), 2);
        assert_eq!(metrics.stale_profile_loads(), 1);
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry = Arc::new(Registry::new());
        SessionMetrics::new(registry.clone()).unwrap();
        assert!(SessionMetrics::new(registry).is_err());
    }
}
