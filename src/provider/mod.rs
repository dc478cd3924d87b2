//! Identity-provider seam. The store talks to exactly one of these; test mode
//! is the fixture implementation selected at store level, never an `if` at a
//! call site.

mod fixture;
mod live;

pub use fixture::FixtureProvider;
pub use live::LiveProvider;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::AuthError;
use crate::model::{Identity, Profile, Session};

/// OAuth providers the platform federates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Apple,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Apple => "apple",
            OAuthProvider::Facebook => "facebook",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Short-lived token for authenticating the platform's own backend calls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Jwt {
    pub jwt: String,
}

/// Out-of-band token handle (magic link, phone OTP, verification, recovery).
/// The secret itself travels out of band; only the handle comes back here.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenHandle {
    pub id: String,
    pub user_id: String,
}

/// Operations consumed from the hosted identity provider. Every method that
/// fails reports a typed [`AuthError::Provider`] produced at this boundary.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(&self, req: &SignUpRequest) -> Result<Identity, AuthError>;
    async fn create_email_session(&self, email: &str, password: &str)
        -> Result<Session, AuthError>;
    /// Build the redirect URL that hands control to the federated provider.
    /// No session is established here; completion is observed by a later
    /// `initialize` on the page the flow returns to.
    fn oauth_redirect_url(&self, provider: OAuthProvider, success: &str, failure: &str) -> String;
    async fn create_magic_url_token(&self, email: &str, url: &str)
        -> Result<TokenHandle, AuthError>;
    async fn create_phone_token(&self, phone: &str) -> Result<TokenHandle, AuthError>;

    async fn get_account(&self) -> Result<Identity, AuthError>;
    async fn get_session(&self) -> Result<Session, AuthError>;
    async fn list_sessions(&self) -> Result<Vec<Session>, AuthError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), AuthError>;
    async fn delete_sessions(&self) -> Result<(), AuthError>;

    async fn update_password(&self, password: &str, old_password: Option<&str>)
        -> Result<Identity, AuthError>;
    async fn update_email(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    async fn update_phone(&self, phone: &str, password: &str) -> Result<Identity, AuthError>;
    async fn update_name(&self, name: &str) -> Result<Identity, AuthError>;
    async fn update_prefs(
        &self,
        prefs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Identity, AuthError>;

    async fn create_email_verification(&self, url: &str) -> Result<TokenHandle, AuthError>;
    async fn confirm_email_verification(&self, user_id: &str, secret: &str)
        -> Result<(), AuthError>;
    async fn create_phone_verification(&self) -> Result<TokenHandle, AuthError>;
    async fn confirm_phone_verification(&self, user_id: &str, secret: &str)
        -> Result<(), AuthError>;

    async fn create_password_recovery(&self, email: &str, url: &str)
        -> Result<TokenHandle, AuthError>;
    async fn confirm_password_recovery(
        &self,
        user_id: &str,
        secret: &str,
        password: &str,
    ) -> Result<(), AuthError>;

    async fn create_jwt(&self) -> Result<Jwt, AuthError>;

    /// Adopt a persisted session's credential so subsequent calls authenticate.
    /// No-op for providers that do not carry ambient credentials.
    fn restore(&self, _session: &Session) {}

    /// Application profile the provider wants installed alongside an identity.
    /// The live provider has none (the profile backend owns that record); the
    /// fixture supplies its canned profile here.
    fn profile_overlay(&self, _identity: &Identity) -> Option<Profile> {
        None
    }
}
