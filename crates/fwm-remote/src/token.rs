//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Backend client facade and wire normalisation."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
use std::sync::Arc;

use fwm_common::{LocalStore, LocalStoreExt};

use crate::error::Result;
use crate::types::AuthSession;

/// Local storage key holding the serialized [`AuthSession`].
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Bearer-token persistence on top of the local store.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn LocalStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Option<AuthSession> {
        self.store.get_json(AUTH_TOKEN_KEY)
    }

    pub fn save(&self, session: &AuthSession) -> Result<()> {
        self.store.set_json(AUTH_TOKEN_KEY, session)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(AUTH_TOKEN_KEY)?;
        Ok(())
    }

    pub fn access_token(&self) -> Option<String> {
        self.load().map(|session| session.access_token)
    }
}
