//! Deterministic stand-in for the hosted identity provider. Used for demo and
//! development sessions; every method resolves locally and bumps a call
//! counter so tests can assert that no provider traffic happened.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{IdentityProvider, Jwt, OAuthProvider, SignUpRequest, TokenHandle};
use crate::error::AuthError;
use crate::model::{AuthMethod, Identity, Profile, Session, SessionAttrs};

pub const TEST_USER_ID: &str = "usr_test_alkabir";
pub const TEST_SESSION_ID: &str = "ses_test_alkabir";
pub const TEST_EMAIL: &str = "test@alkabir.ae";
pub const TEST_NAME: &str = "Ahmed Al-Mansoori";
pub const TEST_JWT: &str = "test-jwt-token";

static CREATED_AT: Lazy<DateTime<Utc>> =
    Lazy::new(|| Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
// Far enough out that any sane clock sees the canned session as live.
static EXPIRE_AT: Lazy<DateTime<Utc>> =
    Lazy::new(|| Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap());

fn canned_identity() -> Identity {
    Identity {
        id: TEST_USER_ID.to_string(),
        name: TEST_NAME.to_string(),
        email: TEST_EMAIL.to_string(),
        phone: Some("+971501234567".to_string()),
        email_verified: true,
        phone_verified: true,
        mfa_enabled: false,
        prefs: BTreeMap::new(),
        created_at: *CREATED_AT,
        accessed_at: *CREATED_AT,
    }
}

fn canned_session() -> Session {
    Session {
        id: TEST_SESSION_ID.to_string(),
        user_id: TEST_USER_ID.to_string(),
        expire: *EXPIRE_AT,
        method: AuthMethod::Password,
        attrs: SessionAttrs {
            device: Some("Test Device".to_string()),
            client: Some("alkabir-web".to_string()),
            ip: None,
        },
        current: true,
        secret: None,
    }
}

fn canned_profile() -> Profile {
    Profile {
        id: TEST_USER_ID.to_string(),
        full_name: TEST_NAME.to_string(),
        email: Some(TEST_EMAIL.to_string()),
        phone: Some("+971501234567".to_string()),
        address: Some("Al Barsha 1".to_string()),
        city: Some("Dubai".to_string()),
        avatar_url: None,
        is_professional: false,
        is_verified: true,
        last_login: Some(*CREATED_AT),
    }
}

/// Fixture provider: canned identity/session honoring update actions locally.
pub struct FixtureProvider {
    identity: RwLock<Identity>,
    session: RwLock<Session>,
    calls: AtomicUsize,
}

impl Default for FixtureProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self {
            identity: RwLock::new(canned_identity()),
            session: RwLock::new(canned_session()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of provider operations invoked since construction.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Canned triple installed when test mode turns on. Pure data access,
    /// does not count as a provider call.
    pub fn canned_records() -> (Identity, Session, Profile) {
        (canned_identity(), canned_session(), canned_profile())
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for FixtureProvider {
    async fn create_account(&self, req: &SignUpRequest) -> Result<Identity, AuthError> {
        self.tick();
        let mut id = self.identity.write();
        id.email = req.email.clone();
        id.name = req.name.clone();
        Ok(id.clone())
    }

    async fn create_email_session(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<Session, AuthError> {
        self.tick();
        Ok(self.session.read().clone())
    }

    fn oauth_redirect_url(&self, provider: OAuthProvider, success: &str, failure: &str) -> String {
        format!(
            "https://id.test.alkabir.ae/oauth/{}?success={}&failure={}",
            provider.as_str(),
            urlencoding::encode(success),
            urlencoding::encode(failure)
        )
    }

    async fn create_magic_url_token(
        &self,
        _email: &str,
        _url: &str,
    ) -> Result<TokenHandle, AuthError> {
        self.tick();
        Ok(TokenHandle {
            id: "tok_magic_test".into(),
            user_id: TEST_USER_ID.into(),
        })
    }

    async fn create_phone_token(&self, _phone: &str) -> Result<TokenHandle, AuthError> {
        self.tick();
        Ok(TokenHandle {
            id: "tok_phone_test".into(),
            user_id: TEST_USER_ID.into(),
        })
    }

    async fn get_account(&self) -> Result<Identity, AuthError> {
        self.tick();
        Ok(self.identity.read().clone())
    }

    async fn get_session(&self) -> Result<Session, AuthError> {
        self.tick();
        Ok(self.session.read().clone())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, AuthError> {
        self.tick();
        Ok(vec![self.session.read().clone()])
    }

    async fn delete_session(&self, _session_id: &str) -> Result<(), AuthError> {
        self.tick();
        Ok(())
    }

    async fn delete_sessions(&self) -> Result<(), AuthError> {
        self.tick();
        Ok(())
    }

    async fn update_password(
        &self,
        _password: &str,
        _old_password: Option<&str>,
    ) -> Result<Identity, AuthError> {
        self.tick();
        Ok(self.identity.read().clone())
    }

    async fn update_email(&self, email: &str, _password: &str) -> Result<Identity, AuthError> {
        self.tick();
        let mut id = self.identity.write();
        id.email = email.to_string();
        id.email_verified = false;
        Ok(id.clone())
    }

    async fn update_phone(&self, phone: &str, _password: &str) -> Result<Identity, AuthError> {
        self.tick();
        let mut id = self.identity.write();
        id.phone = Some(phone.to_string());
        id.phone_verified = false;
        Ok(id.clone())
    }

    async fn update_name(&self, name: &str) -> Result<Identity, AuthError> {
        self.tick();
        let mut id = self.identity.write();
        id.name = name.to_string();
        Ok(id.clone())
    }

    async fn update_prefs(
        &self,
        prefs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Identity, AuthError> {
        self.tick();
        let mut id = self.identity.write();
        id.prefs = prefs.clone();
        Ok(id.clone())
    }

    async fn create_email_verification(&self, _url: &str) -> Result<TokenHandle, AuthError> {
        self.tick();
        Ok(TokenHandle {
            id: "tok_verify_email_test".into(),
            user_id: TEST_USER_ID.into(),
        })
    }

    async fn confirm_email_verification(
        &self,
        _user_id: &str,
        _secret: &str,
    ) -> Result<(), AuthError> {
        self.tick();
        self.identity.write().email_verified = true;
        Ok(())
    }

    async fn create_phone_verification(&self) -> Result<TokenHandle, AuthError> {
        self.tick();
        Ok(TokenHandle {
            id: "tok_verify_phone_test".into(),
            user_id: TEST_USER_ID.into(),
        })
    }

    async fn confirm_phone_verification(
        &self,
        _user_id: &str,
        _secret: &str,
    ) -> Result<(), AuthError> {
        self.tick();
        self.identity.write().phone_verified = true;
        Ok(())
    }

    async fn create_password_recovery(
        &self,
        _email: &str,
        _url: &str,
    ) -> Result<TokenHandle, AuthError> {
        self.tick();
        Ok(TokenHandle {
            id: "tok_recovery_test".into(),
            user_id: TEST_USER_ID.into(),
        })
    }

    async fn confirm_password_recovery(
        &self,
        _user_id: &str,
        _secret: &str,
        _password: &str,
    ) -> Result<(), AuthError> {
        self.tick();
        Ok(())
    }

    async fn create_jwt(&self) -> Result<Jwt, AuthError> {
        self.tick();
        Ok(Jwt {
            jwt: TEST_JWT.to_string(),
        })
    }

    fn profile_overlay(&self, _identity: &Identity) -> Option<Profile> {
        Some(canned_profile())
    }
}
