//! Single source of truth for authentication state. The store is a
//! constructed object, not a global: every instance owns its snapshot, its
//! provider selection, and its durable record, so isolated instances can
//! coexist in tests.
//!
//! Overlapping mutating actions are not arbitrated: whichever settles last
//! wins the final state write. This mirrors the UI event-loop model the store
//! serves and is a documented property, not an oversight.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::model::{Identity, Profile, ProfilePatch, Session, Snapshot};
use crate::persist::{PersistedState, SnapshotFile};
use crate::provider::{
    FixtureProvider, IdentityProvider, Jwt, LiveProvider, OAuthProvider, SignUpRequest,
    TokenHandle,
};

pub struct SessionStore {
    config: AuthConfig,
    live: Arc<dyn IdentityProvider>,
    fixture: RwLock<Arc<FixtureProvider>>,
    snapshot: RwLock<Snapshot>,
    persist: Option<SnapshotFile>,
    tx: watch::Sender<Snapshot>,
}

impl SessionStore {
    /// Store backed by the hosted identity API named in `config`.
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let live = Arc::new(LiveProvider::new(&config)?);
        Ok(Self::with_provider(config, live))
    }

    /// Store backed by an arbitrary provider implementation. Test seam; also
    /// how an embedding application would swap identity vendors.
    pub fn with_provider(config: AuthConfig, live: Arc<dyn IdentityProvider>) -> Self {
        let persist = config.persist_path.as_ref().map(SnapshotFile::new);
        let mut snap = Snapshot::default();
        if let Some(file) = &persist {
            let state = file.load();
            snap.test_mode = state.test_mode;
            snap.initialized = state.initialized;
            // Restore the committed triple only when it is whole and the
            // session has not lapsed; anything else starts signed out.
            if let (Some(identity), Some(session)) = (state.identity, state.session) {
                if !session.is_expired(Utc::now()) {
                    live.restore(&session);
                    snap.identity = Some(identity);
                    snap.session = Some(session);
                    snap.profile = state.profile;
                } else {
                    tracing::info!("auth.restore persisted session expired, starting signed out");
                }
            }
        }
        let (tx, _rx) = watch::channel(snap.clone());
        Self {
            config,
            live,
            fixture: RwLock::new(Arc::new(FixtureProvider::new())),
            snapshot: RwLock::new(snap),
            persist,
            tx,
        }
    }

    // --- Observation ---

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.snapshot.read().identity.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.snapshot.read().session.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.snapshot.read().profile.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot.read().is_authenticated()
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot.read().initialized
    }

    pub fn is_test_mode(&self) -> bool {
        self.snapshot.read().test_mode
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Change feed; receives every committed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// The fixture behind test mode, exposed so tests can assert call counts.
    pub fn fixture(&self) -> Arc<FixtureProvider> {
        self.fixture.read().clone()
    }

    // --- Internals ---

    fn provider(&self) -> Arc<dyn IdentityProvider> {
        if self.snapshot.read().test_mode {
            self.fixture.read().clone()
        } else {
            self.live.clone()
        }
    }

    fn notify(&self) {
        let _ = self.tx.send(self.snapshot.read().clone());
    }

    fn begin(&self) {
        self.snapshot.write().loading = true;
        self.notify();
    }

    /// Commit a mutation: apply, drop `loading`, persist the durable subset,
    /// then notify subscribers.
    fn commit<F: FnOnce(&mut Snapshot)>(&self, f: F) {
        {
            let mut snap = self.snapshot.write();
            f(&mut snap);
            snap.loading = false;
        }
        self.save();
        self.notify();
    }

    /// Drop `loading` leaving prior committed state intact, forwarding the error.
    fn abort(&self, err: AuthError) -> AuthError {
        self.snapshot.write().loading = false;
        self.notify();
        err
    }

    fn save(&self) {
        if let Some(file) = &self.persist {
            let state = PersistedState::from_snapshot(&self.snapshot.read());
            if let Err(e) = file.save(&state) {
                tracing::warn!("auth.persist write failed: {}", e);
            }
        }
    }

    /// Application profile for a freshly fetched identity: the provider's
    /// overlay when it has one, otherwise synthesized from identity fields.
    fn profile_for(&self, identity: &Identity, stamp_login: bool) -> Profile {
        let mut profile = self
            .provider()
            .profile_overlay(identity)
            .unwrap_or_else(|| Profile::synthesize(identity));
        if stamp_login {
            profile.last_login = Some(Utc::now());
        }
        profile
    }

    // --- Actions ---

    /// Populate the snapshot once per application load. Safe to call again;
    /// a second call while initialized is a no-op.
    pub async fn initialize(&self) -> Result<(), AuthError> {
        if self.snapshot.read().initialized {
            tracing::debug!("auth.initialize already initialized, skipping");
            return Ok(());
        }
        self.begin();
        let provider = self.provider();
        let outcome = async {
            let identity = provider.get_account().await?;
            let session = provider.get_session().await?;
            Ok::<_, AuthError>((identity, session))
        }
        .await;
        match outcome {
            Ok((identity, session)) => {
                let profile = self.profile_for(&identity, false);
                tracing::info!("auth.initialize user={} sid={}", identity.id, session.id);
                self.commit(|s| {
                    s.identity = Some(identity);
                    s.session = Some(session);
                    s.profile = Some(profile);
                    s.initialized = true;
                });
            }
            Err(e) => {
                // No active session is the normal signed-out start, not a fault.
                if !e.is_unauthenticated() {
                    tracing::warn!("auth.initialize provider lookup failed: {}", e);
                }
                self.commit(|s| {
                    s.identity = None;
                    s.session = None;
                    s.profile = None;
                    s.initialized = true;
                });
            }
        }
        Ok(())
    }

    /// Create an account and immediately establish a session for it.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Identity, AuthError> {
        validate_email(email)?;
        validate_password(password)?;
        if name.trim().is_empty() {
            return Err(AuthError::validation("empty_name", "Name is required"));
        }
        self.begin();
        let provider = self.provider();
        let req = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        };
        let identity = match provider.create_account(&req).await {
            Ok(i) => i,
            Err(e) => return Err(self.abort(e)),
        };
        let session = match provider.create_email_session(email, password).await {
            Ok(s) => s,
            Err(e) => return Err(self.abort(e)),
        };
        let profile = self.profile_for(&identity, true);
        tracing::info!("auth.sign_up user={} sid={}", identity.id, session.id);
        let out = identity.clone();
        self.commit(|s| {
            s.identity = Some(identity);
            s.session = Some(session);
            s.profile = Some(profile);
        });
        Ok(out)
    }

    /// Establish a session, then fetch the identity behind it.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        validate_email(email)?;
        validate_password(password)?;
        self.begin();
        let provider = self.provider();
        let session = match provider.create_email_session(email, password).await {
            Ok(s) => s,
            Err(e) => return Err(self.abort(e)),
        };
        let identity = match provider.get_account().await {
            Ok(i) => i,
            Err(e) => return Err(self.abort(e)),
        };
        let profile = self.profile_for(&identity, true);
        tracing::info!("auth.sign_in user={} sid={}", identity.id, session.id);
        let out = session.clone();
        self.commit(|s| {
            s.identity = Some(identity);
            s.session = Some(session);
            s.profile = Some(profile);
        });
        Ok(out)
    }

    /// Hand off to the federated provider's redirect flow. Mutates nothing;
    /// completion is observed by `initialize` on the page the flow returns to.
    /// Returns the URL the embedding application should navigate to.
    pub fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        success_url: Option<&str>,
        failure_url: Option<&str>,
    ) -> String {
        let success = success_url
            .map(str::to_string)
            .unwrap_or_else(|| self.config.oauth_success_url());
        let failure = failure_url
            .map(str::to_string)
            .unwrap_or_else(|| self.config.oauth_failure_url());
        tracing::info!("auth.oauth_redirect provider={}", provider.as_str());
        self.provider().oauth_redirect_url(provider, &success, &failure)
    }

    /// Request a magic-link token be mailed out. Establishes no session.
    pub async fn sign_in_with_magic_url(
        &self,
        email: &str,
        url: &str,
    ) -> Result<TokenHandle, AuthError> {
        validate_email(email)?;
        self.begin();
        let out = self.provider().create_magic_url_token(email, url).await;
        self.settle(out)
    }

    /// Request a phone OTP. Establishes no session.
    pub async fn sign_in_with_phone(&self, phone: &str) -> Result<TokenHandle, AuthError> {
        if phone.trim().is_empty() {
            return Err(AuthError::validation("empty_phone", "Phone number is required"));
        }
        self.begin();
        let out = self.provider().create_phone_token(phone).await;
        self.settle(out)
    }

    /// Destroy the current session and clear the committed triple.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.begin();
        match self.provider().delete_session("current").await {
            Ok(()) => {
                tracing::info!("auth.sign_out");
                self.commit(Self::clear_triple);
                Ok(())
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Destroy every session for the identity (all devices), then clear state.
    pub async fn sign_out_all(&self) -> Result<(), AuthError> {
        self.begin();
        match self.provider().delete_sessions().await {
            Ok(()) => {
                tracing::info!("auth.sign_out_all");
                self.commit(Self::clear_triple);
                Ok(())
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Destroy one session by id. Clears local state only when it was the
    /// current one.
    pub async fn sign_out_session(&self, session_id: &str) -> Result<(), AuthError> {
        self.begin();
        let was_current = self
            .snapshot
            .read()
            .session
            .as_ref()
            .is_some_and(|s| s.id == session_id);
        match self.provider().delete_session(session_id).await {
            Ok(()) => {
                self.commit(|s| {
                    if was_current {
                        Self::clear_triple(s);
                    }
                });
                Ok(())
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Every active session for the identity, freshest data from the provider.
    pub async fn list_sessions(&self) -> Result<Vec<Session>, AuthError> {
        self.begin();
        let out = self.provider().list_sessions().await;
        self.settle(out)
    }

    /// Best-effort refresh of the identity. "Not logged in" is an empty
    /// result, not an error; any provider failure clears the committed triple
    /// so the pair invariant holds. A refresh that succeeds while no session
    /// is committed re-fetches the session too; half a pair never lands.
    pub async fn get_current_user(&self) -> Result<Option<Identity>, AuthError> {
        self.begin();
        let provider = self.provider();
        match provider.get_account().await {
            Ok(identity) => {
                let fetched_session = if self.snapshot.read().session.is_none() {
                    match provider.get_session().await {
                        Ok(s) => Some(s),
                        Err(e) => {
                            if !e.is_unauthenticated() {
                                tracing::warn!("auth.refresh_user failed: {}", e);
                            }
                            self.commit(Self::clear_triple);
                            return Ok(None);
                        }
                    }
                } else {
                    None
                };
                let profile = if self.snapshot.read().profile.is_none() {
                    Some(self.profile_for(&identity, false))
                } else {
                    None
                };
                let out = identity.clone();
                self.commit(|s| {
                    s.identity = Some(identity);
                    if let Some(session) = fetched_session {
                        s.session = Some(session);
                    }
                    if let Some(profile) = profile {
                        s.profile = Some(profile);
                    }
                });
                Ok(Some(out))
            }
            Err(e) => {
                if !e.is_unauthenticated() {
                    tracing::warn!("auth.refresh_user failed: {}", e);
                }
                self.commit(Self::clear_triple);
                Ok(None)
            }
        }
    }

    /// Best-effort refresh of the session; same failure and re-pairing policy
    /// as [`get_current_user`](Self::get_current_user).
    pub async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        self.begin();
        let provider = self.provider();
        match provider.get_session().await {
            Ok(session) => {
                let fetched_identity = if self.snapshot.read().identity.is_none() {
                    match provider.get_account().await {
                        Ok(i) => Some(i),
                        Err(e) => {
                            if !e.is_unauthenticated() {
                                tracing::warn!("auth.refresh_session failed: {}", e);
                            }
                            self.commit(Self::clear_triple);
                            return Ok(None);
                        }
                    }
                } else {
                    None
                };
                let profile = match &fetched_identity {
                    Some(identity) if self.snapshot.read().profile.is_none() => {
                        Some(self.profile_for(identity, false))
                    }
                    _ => None,
                };
                let out = session.clone();
                self.commit(|s| {
                    s.session = Some(session);
                    if let Some(identity) = fetched_identity {
                        s.identity = Some(identity);
                    }
                    if let Some(profile) = profile {
                        s.profile = Some(profile);
                    }
                });
                Ok(Some(out))
            }
            Err(e) => {
                if !e.is_unauthenticated() {
                    tracing::warn!("auth.refresh_session failed: {}", e);
                }
                self.commit(Self::clear_triple);
                Ok(None)
            }
        }
    }

    /// Merge a partial update into the loaded profile. Local commit only; the
    /// profile backend's own persistence is outside this store (see DESIGN.md).
    pub fn update_profile(&self, patch: &ProfilePatch) -> Result<Profile, AuthError> {
        let mut snap = self.snapshot.write();
        let profile = snap.profile.as_mut().ok_or(AuthError::NoProfile)?;
        profile.apply(patch);
        let out = profile.clone();
        drop(snap);
        self.save();
        self.notify();
        Ok(out)
    }

    pub async fn update_password(
        &self,
        password: &str,
        old_password: Option<&str>,
    ) -> Result<Identity, AuthError> {
        validate_password(password)?;
        self.begin();
        let out = self.provider().update_password(password, old_password).await;
        self.replace_identity(out)
    }

    pub async fn update_email(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        validate_email(email)?;
        self.begin();
        let out = self.provider().update_email(email, password).await;
        self.replace_identity(out)
    }

    pub async fn update_phone(&self, phone: &str, password: &str) -> Result<Identity, AuthError> {
        if phone.trim().is_empty() {
            return Err(AuthError::validation("empty_phone", "Phone number is required"));
        }
        self.begin();
        let out = self.provider().update_phone(phone, password).await;
        self.replace_identity(out)
    }

    pub async fn update_name(&self, name: &str) -> Result<Identity, AuthError> {
        if name.trim().is_empty() {
            return Err(AuthError::validation("empty_name", "Name is required"));
        }
        self.begin();
        let out = self.provider().update_name(name).await;
        self.replace_identity(out)
    }

    pub async fn update_preferences(
        &self,
        prefs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Identity, AuthError> {
        self.begin();
        let out = self.provider().update_prefs(prefs).await;
        self.replace_identity(out)
    }

    pub async fn send_email_verification(&self, url: &str) -> Result<TokenHandle, AuthError> {
        self.begin();
        let out = self.provider().create_email_verification(url).await;
        self.settle(out)
    }

    /// Confirm an email verification, then re-fetch the identity so the
    /// verification flags reflect server truth.
    pub async fn confirm_email_verification(
        &self,
        user_id: &str,
        secret: &str,
    ) -> Result<(), AuthError> {
        self.begin();
        let provider = self.provider();
        if let Err(e) = provider.confirm_email_verification(user_id, secret).await {
            return Err(self.abort(e));
        }
        let out = provider.get_account().await;
        self.replace_identity(out).map(|_| ())
    }

    pub async fn send_phone_verification(&self) -> Result<TokenHandle, AuthError> {
        self.begin();
        let out = self.provider().create_phone_verification().await;
        self.settle(out)
    }

    pub async fn confirm_phone_verification(
        &self,
        user_id: &str,
        secret: &str,
    ) -> Result<(), AuthError> {
        self.begin();
        let provider = self.provider();
        if let Err(e) = provider.confirm_phone_verification(user_id, secret).await {
            return Err(self.abort(e));
        }
        let out = provider.get_account().await;
        self.replace_identity(out).map(|_| ())
    }

    /// Start a password-reset flow. No local state changes.
    pub async fn send_password_recovery(
        &self,
        email: &str,
        url: &str,
    ) -> Result<TokenHandle, AuthError> {
        validate_email(email)?;
        self.begin();
        let out = self.provider().create_password_recovery(email, url).await;
        self.settle(out)
    }

    /// Complete a password-reset flow. No local state changes.
    pub async fn confirm_password_recovery(
        &self,
        user_id: &str,
        secret: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        validate_password(password)?;
        self.begin();
        let out = self
            .provider()
            .confirm_password_recovery(user_id, secret, password)
            .await;
        self.settle(out)
    }

    /// Short-lived token for authenticating the platform's own backend calls.
    pub async fn create_jwt(&self) -> Result<Jwt, AuthError> {
        self.begin();
        let out = self.provider().create_jwt().await;
        self.settle(out)
    }

    /// Flip test mode. On: install the canned triple immediately, bypassing
    /// the provider. Off: clear all three regardless of prior real state; the
    /// caller re-runs `initialize` or signs in again to recover.
    pub fn toggle_test_mode(&self) {
        let turning_on = !self.snapshot.read().test_mode;
        if turning_on {
            // Fresh fixture per activation so earlier demo runs cannot leak in.
            *self.fixture.write() = Arc::new(FixtureProvider::new());
            let (identity, session, profile) = FixtureProvider::canned_records();
            tracing::info!("auth.test_mode on user={}", identity.id);
            self.commit(|s| {
                s.test_mode = true;
                s.identity = Some(identity);
                s.session = Some(session);
                s.profile = Some(profile);
            });
        } else {
            tracing::info!("auth.test_mode off");
            self.commit(|s| {
                s.test_mode = false;
                Self::clear_triple(s);
            });
        }
    }

    // --- Small shared helpers ---

    fn clear_triple(s: &mut Snapshot) {
        s.identity = None;
        s.session = None;
        s.profile = None;
    }

    /// Settle an action that mutates nothing: drop `loading`, forward the result.
    /// Settling a non-mutating action clears `loading` and notifies without
    /// touching the snapshot file.
    fn settle<T>(&self, out: Result<T, AuthError>) -> Result<T, AuthError> {
        match out {
            Ok(v) => {
                self.snapshot.write().loading = false;
                self.notify();
                Ok(v)
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Settle an action whose success replaces the Identity sub-field. The
    /// replacement only lands while a session is committed; a stale update
    /// resolving after sign-out must not leave an identity without its pair.
    fn replace_identity(
        &self,
        out: Result<Identity, AuthError>,
    ) -> Result<Identity, AuthError> {
        match out {
            Ok(identity) => {
                let stored = identity.clone();
                self.commit(|s| {
                    if s.session.is_some() {
                        s.identity = Some(stored);
                    }
                });
                Ok(identity)
            }
            Err(e) => Err(self.abort(e)),
        }
    }
}

// --- Input validation (caught before any provider call) ---

fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::validation("empty_email", "Email is required"));
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AuthError::validation(
            "invalid_email",
            "Email address is malformed",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::validation("empty_password", "Password is required"));
    }
    Ok(())
}
