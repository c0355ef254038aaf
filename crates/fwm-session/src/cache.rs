//! ---
//! fwm_section: "06-security-access-control"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Session state, role hierarchy and permission predicates."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::sync::Arc;

use fwm_common::{LocalStore, LocalStoreExt, StoreError};

use crate::profile::Profile;

pub const USER_ID_KEY: &str = "user_id";
pub const USER_EMAIL_KEY: &str = "user_email";
pub const USER_ROLE_KEY: &str = "user_role";
pub const USER_PROFILE_KEY: &str = "user_profile";

/// Local read-through copy of the signed-in profile. Only the session holder
/// writes these keys.
#[derive(Clone)]
pub struct ProfileCache {
    store: Arc<dyn LocalStore>,
}

impl ProfileCache {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub fn store(&self, profile: &Profile) -> Result<(), StoreError> {
        self.store.set(USER_ID_KEY, profile.id.clone())?;
        self.store.set(USER_EMAIL_KEY, profile.email.clone())?;
        self.store.set(USER_ROLE_KEY, profile.role.to_string())?;
        self.store.set_json(USER_PROFILE_KEY, profile)
    }

    pub fn load(&self) -> Option<Profile> {
        self.store.get_json(USER_PROFILE_KEY)
    }

    pub fn cached_user_id(&self) -> Option<String> {
        self.store.get(USER_ID_KEY)
    }

    /// Remove every key except `preserved`, returning the removed keys.
    pub fn clear_user_scope(&self, preserved: &[String]) -> Result<Vec<String>, StoreError> {
        self.store.retain_only(preserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use chrono::Utc;
    use fwm_common::MemoryStore;
    use fwm_remote::Identity;

    #[test]
    fn store_and_clear_keep_preferences() {
        let store = Arc::new(MemoryStore::new());
        store.set("language", "fr".into()).unwrap();
        store.set("theme", "dark".into()).unwrap();
        store.set("auth_token", "{}".into()).unwrap();
        let cache = ProfileCache::new(store.clone());

        let mut profile =
            Profile::default_for(&Identity::new("u-1", "lead@factory.test"), Utc::now());
        profile.role = Role::TeamLead;
        cache.store(&profile).unwrap();
        assert_eq!(cache.load(), Some(profile));
        assert_eq!(store.get(USER_ROLE_KEY).as_deref(), Some("team_lead"));
        assert_eq!(cache.cached_user_id().as_deref(), Some("u-1"));

        let mut removed = cache
            .clear_user_scope(&["language".into(), "theme".into()])
            .unwrap();
        removed.sort();
        assert_eq!(
            removed,
            vec![
                "auth_token",
                USER_EMAIL_KEY,
                USER_ID_KEY,
                USER_PROFILE_KEY,
                USER_ROLE_KEY
            ]
        );
        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["language", "theme"]);
        assert!(cache.load().is_none());
    }
}
