//! Bridge between the store and the rendering layer: derived flags computed
//! on every read (never cached) and the guarded-render decision.

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::AuthError;
use crate::model::Snapshot;
use crate::store::SessionStore;

/// What a guarded view should render right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Not initialized yet, or an action is in flight: show a loading affordance.
    Loading,
    /// Settled and authenticated: render the protected content.
    Allow,
    /// Settled and unauthenticated: send the user to the given location.
    Redirect(String),
}

#[derive(Clone)]
pub struct AuthContext {
    store: Arc<SessionStore>,
}

impl AuthContext {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Initialization-on-mount. Delegates to the store's idempotent
    /// `initialize`; calling it from every mounted view is safe.
    pub async fn ensure_initialized(&self) -> Result<(), AuthError> {
        self.store.initialize().await
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Committed-snapshot feed for reactive rendering.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.store.subscribe()
    }

    // --- Derived flags, computed from the snapshot on every read ---

    pub fn is_authenticated(&self) -> bool {
        let snap = self.store.snapshot();
        snap.identity.is_some() && snap.session.is_some()
    }

    pub fn is_email_verified(&self) -> bool {
        self.store
            .identity()
            .map(|i| i.email_verified)
            .unwrap_or(false)
    }

    pub fn is_phone_verified(&self) -> bool {
        self.store
            .identity()
            .map(|i| i.phone_verified)
            .unwrap_or(false)
    }

    pub fn is_mfa_enabled(&self) -> bool {
        self.store
            .identity()
            .map(|i| i.mfa_enabled)
            .unwrap_or(false)
    }

    pub fn is_professional(&self) -> bool {
        self.store
            .profile()
            .map(|p| p.is_professional)
            .unwrap_or(false)
    }

    pub fn is_verified(&self) -> bool {
        self.store.profile().map(|p| p.is_verified).unwrap_or(false)
    }

    /// Guarded-render decision: loading until initialized and settled, then
    /// allow or redirect based on authentication.
    pub fn gate(&self, redirect_to: &str) -> Gate {
        let snap = self.store.snapshot();
        if !snap.initialized || snap.loading {
            return Gate::Loading;
        }
        if snap.is_authenticated() {
            Gate::Allow
        } else {
            Gate::Redirect(redirect_to.to_string())
        }
    }
}
