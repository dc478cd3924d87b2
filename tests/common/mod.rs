//! Shared test harness: a tiny in-memory identity service implementing the
//! provider seam, with call counting for no-traffic assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use alkabir_auth::error::{AuthError, ProviderErrorKind};
use alkabir_auth::model::{AuthMethod, Identity, Session, SessionAttrs};
use alkabir_auth::provider::{
    IdentityProvider, Jwt, OAuthProvider, SignUpRequest, TokenHandle,
};

#[derive(Debug, Clone)]
pub struct MockAccount {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub prefs: BTreeMap<String, serde_json::Value>,
}

pub struct MockProvider {
    account: Mutex<Option<MockAccount>>,
    session: Mutex<Option<Session>>,
    created_at: DateTime<Utc>,
    calls: AtomicUsize,
}

/// Route test-run tracing through the fmt subscriber; repeat calls are fine.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn unauthorized() -> AuthError {
    AuthError::provider(
        ProviderErrorKind::SessionNotFound,
        "user_session_not_found",
        "No active session",
    )
}

impl MockProvider {
    pub fn new() -> Self {
        init_tracing();
        Self {
            account: Mutex::new(None),
            session: Mutex::new(None),
            created_at: Utc::now(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Service pre-seeded with one registered account.
    pub fn with_account(email: &str, password: &str, name: &str) -> Self {
        let p = Self::new();
        *p.account.lock() = Some(MockAccount {
            id: "usr_mock_1".into(),
            email: email.into(),
            password: password.into(),
            name: name.into(),
            phone: None,
            email_verified: false,
            phone_verified: false,
            prefs: BTreeMap::new(),
        });
        p
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn identity(&self) -> Option<Identity> {
        self.account.lock().as_ref().map(|a| Identity {
            id: a.id.clone(),
            name: a.name.clone(),
            email: a.email.clone(),
            phone: a.phone.clone(),
            email_verified: a.email_verified,
            phone_verified: a.phone_verified,
            mfa_enabled: false,
            prefs: a.prefs.clone(),
            created_at: self.created_at,
            accessed_at: Utc::now(),
        })
    }

    fn authed_identity(&self) -> Result<Identity, AuthError> {
        if self.session.lock().is_none() {
            return Err(unauthorized());
        }
        self.identity().ok_or_else(unauthorized)
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn create_account(&self, req: &SignUpRequest) -> Result<Identity, AuthError> {
        self.tick();
        let mut account = self.account.lock();
        if account.as_ref().is_some_and(|a| a.email == req.email) {
            return Err(AuthError::provider(
                ProviderErrorKind::UserAlreadyExists,
                "user_already_exists",
                "A user with the same email already exists",
            ));
        }
        *account = Some(MockAccount {
            id: String::from("usr_mock_1"),
            email: req.email.clone(),
            password: req.password.clone(),
            name: req.name.clone(),
            phone: None,
            email_verified: false,
            phone_verified: false,
            prefs: BTreeMap::new(),
        });
        drop(account);
        Ok(self.identity().unwrap())
    }

    async fn create_email_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        self.tick();
        let ok = self
            .account
            .lock()
            .as_ref()
            .is_some_and(|a| a.email == email && a.password == password);
        if !ok {
            return Err(AuthError::provider(
                ProviderErrorKind::InvalidCredentials,
                "user_invalid_credentials",
                "Invalid credentials",
            ));
        }
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: "usr_mock_1".into(),
            expire: Utc::now() + Duration::days(7),
            method: AuthMethod::Password,
            attrs: SessionAttrs {
                device: Some("mock".into()),
                client: None,
                ip: None,
            },
            current: true,
            secret: Some(uuid::Uuid::new_v4().to_string()),
        };
        *self.session.lock() = Some(session.clone());
        Ok(session)
    }

    fn oauth_redirect_url(&self, provider: OAuthProvider, success: &str, failure: &str) -> String {
        format!("mock://oauth/{}?s={}&f={}", provider.as_str(), success, failure)
    }

    async fn create_magic_url_token(
        &self,
        _email: &str,
        _url: &str,
    ) -> Result<TokenHandle, AuthError> {
        self.tick();
        Ok(TokenHandle {
            id: "tok_magic".into(),
            user_id: "usr_mock_1".into(),
        })
    }

    async fn create_phone_token(&self, _phone: &str) -> Result<TokenHandle, AuthError> {
        self.tick();
        Ok(TokenHandle {
            id: "tok_phone".into(),
            user_id: "usr_mock_1".into(),
        })
    }

    async fn get_account(&self) -> Result<Identity, AuthError> {
        self.tick();
        self.authed_identity()
    }

    async fn get_session(&self) -> Result<Session, AuthError> {
        self.tick();
        self.session.lock().clone().ok_or_else(unauthorized)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, AuthError> {
        self.tick();
        Ok(self.session.lock().iter().cloned().collect())
    }

    async fn delete_session(&self, _session_id: &str) -> Result<(), AuthError> {
        self.tick();
        if self.session.lock().take().is_none() {
            return Err(unauthorized());
        }
        Ok(())
    }

    async fn delete_sessions(&self) -> Result<(), AuthError> {
        self.tick();
        *self.session.lock() = None;
        Ok(())
    }

    async fn update_password(
        &self,
        password: &str,
        _old_password: Option<&str>,
    ) -> Result<Identity, AuthError> {
        self.tick();
        self.authed_identity()?;
        self.account.lock().as_mut().unwrap().password = password.into();
        Ok(self.identity().unwrap())
    }

    async fn update_email(&self, email: &str, _password: &str) -> Result<Identity, AuthError> {
        self.tick();
        self.authed_identity()?;
        let mut account = self.account.lock();
        let a = a_mut(&mut account);
        a.email = email.into();
        a.email_verified = false;
        drop(account);
        Ok(self.identity().unwrap())
    }

    async fn update_phone(&self, phone: &str, _password: &str) -> Result<Identity, AuthError> {
        self.tick();
        self.authed_identity()?;
        let mut account = self.account.lock();
        let a = a_mut(&mut account);
        a.phone = Some(phone.into());
        a.phone_verified = false;
        drop(account);
        Ok(self.identity().unwrap())
    }

    async fn update_name(&self, name: &str) -> Result<Identity, AuthError> {
        self.tick();
        self.authed_identity()?;
        self.account.lock().as_mut().unwrap().name = name.into();
        Ok(self.identity().unwrap())
    }

    async fn update_prefs(
        &self,
        prefs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Identity, AuthError> {
        self.tick();
        self.authed_identity()?;
        self.account.lock().as_mut().unwrap().prefs = prefs.clone();
        Ok(self.identity().unwrap())
    }

    async fn create_email_verification(&self, _url: &str) -> Result<TokenHandle, AuthError> {
        self.tick();
        self.authed_identity()?;
        Ok(TokenHandle {
            id: "tok_verify_email".into(),
            user_id: "usr_mock_1".into(),
        })
    }

    async fn confirm_email_verification(
        &self,
        _user_id: &str,
        _secret: &str,
    ) -> Result<(), AuthError> {
        self.tick();
        self.account.lock().as_mut().ok_or_else(unauthorized)?.email_verified = true;
        Ok(())
    }

    async fn create_phone_verification(&self) -> Result<TokenHandle, AuthError> {
        self.tick();
        self.authed_identity()?;
        Ok(TokenHandle {
            id: "tok_verify_phone".into(),
            user_id: "usr_mock_1".into(),
        })
    }

    async fn confirm_phone_verification(
        &self,
        _user_id: &str,
        _secret: &str,
    ) -> Result<(), AuthError> {
        self.tick();
        self.account.lock().as_mut().ok_or_else(unauthorized)?.phone_verified = true;
        Ok(())
    }

    async fn create_password_recovery(
        &self,
        _email: &str,
        _url: &str,
    ) -> Result<TokenHandle, AuthError> {
        self.tick();
        Ok(TokenHandle {
            id: "tok_recovery".into(),
            user_id: "usr_mock_1".into(),
        })
    }

    async fn confirm_password_recovery(
        &self,
        _user_id: &str,
        _secret: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        self.tick();
        if let Some(a) = self.account.lock().as_mut() {
            a.password = password.into();
        }
        Ok(())
    }

    async fn create_jwt(&self) -> Result<Jwt, AuthError> {
        self.tick();
        self.authed_identity()?;
        Ok(Jwt {
            jwt: "mock-jwt".into(),
        })
    }

    fn restore(&self, session: &Session) {
        *self.session.lock() = Some(session.clone());
    }
}

fn a_mut<'a>(account: &'a mut Option<MockAccount>) -> &'a mut MockAccount {
    account.as_mut().expect("account present after auth check")
}
