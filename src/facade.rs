//! Compatibility facade: a second, stable-shaped view over the session store
//! using the field conventions of the platform's previous auth vendor, so
//! callers written against either shape keep working during the migration.
//!
//! Read side is a pure one-way mapping over the store's snapshot; no state is
//! duplicated. Write side wraps the handful of actions legacy callers use and
//! normalizes every failure to a shape with a guaranteed `message` string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AuthError;
use crate::model::{Identity, Profile, ProfilePatch, Session};
use crate::store::SessionStore;

// --- Legacy-shaped DTOs (previous vendor's field naming) ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyUserMetadata {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyUser {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub user_metadata: LegacyUserMetadata,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub phone_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySession {
    pub user_id: String,
    /// Unix seconds, as the previous vendor exposed it.
    pub expires_at: i64,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyProfile {
    pub id: String,
    pub full_name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    pub is_professional: bool,
    pub is_verified: bool,
}

/// Normalized failure shape: callers can always rely on `message`, with the
/// original typed fields carried alongside.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct LegacyError {
    pub message: String,
    pub code: Option<String>,
    pub kind: Option<String>,
}

impl From<AuthError> for LegacyError {
    fn from(err: AuthError) -> Self {
        let kind = err
            .provider_kind()
            .map(|k| format!("{:?}", k).to_lowercase());
        LegacyError {
            message: err.message(),
            code: Some(err.code_str().to_string()),
            kind,
        }
    }
}

// --- One-way mappings (new shape -> legacy shape) ---

pub fn to_legacy_user(identity: &Identity) -> LegacyUser {
    // The legacy shape carried confirmation timestamps, not flags; the exact
    // instant is not recoverable, so a confirmed flag maps to "now known
    // confirmed as of the identity's last access".
    let confirmed_at = |flag: bool| flag.then_some(identity.accessed_at);
    LegacyUser {
        id: identity.id.clone(),
        email: Some(identity.email.clone()),
        phone: identity.phone.clone(),
        user_metadata: LegacyUserMetadata {
            full_name: Some(identity.name.clone()),
            phone: identity.phone.clone(),
        },
        email_confirmed_at: confirmed_at(identity.email_verified),
        phone_confirmed_at: confirmed_at(identity.phone_verified),
        created_at: identity.created_at,
        last_sign_in_at: Some(identity.accessed_at),
    }
}

pub fn to_legacy_session(session: &Session) -> LegacySession {
    LegacySession {
        user_id: session.user_id.clone(),
        expires_at: session.expire.timestamp(),
        provider: match &session.method {
            crate::model::AuthMethod::Password => "email".to_string(),
            crate::model::AuthMethod::OAuth { provider } => provider.clone(),
            crate::model::AuthMethod::MagicUrl => "magiclink".to_string(),
            crate::model::AuthMethod::Phone => "phone".to_string(),
        },
    }
}

pub fn to_legacy_profile(profile: &Profile) -> LegacyProfile {
    LegacyProfile {
        id: profile.id.clone(),
        full_name: profile.full_name.clone(),
        address: profile.address.clone(),
        city: profile.city.clone(),
        avatar_url: profile.avatar_url.clone(),
        is_professional: profile.is_professional,
        is_verified: profile.is_verified,
    }
}

/// Legacy-facing view over a [`SessionStore`].
pub struct AuthFacade {
    store: Arc<SessionStore>,
}

impl AuthFacade {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Legacy user, or `None` when no identity is loaded. Never partial: a
    /// null identity yields null user/session/profile across the board.
    pub fn user(&self) -> Option<LegacyUser> {
        self.store.identity().map(|i| to_legacy_user(&i))
    }

    pub fn session(&self) -> Option<LegacySession> {
        let snap = self.store.snapshot();
        match (&snap.identity, &snap.session) {
            (Some(_), Some(session)) => Some(to_legacy_session(session)),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<LegacyProfile> {
        let snap = self.store.snapshot();
        match (&snap.identity, &snap.profile) {
            (Some(_), Some(profile)) => Some(to_legacy_profile(profile)),
            _ => None,
        }
    }

    // --- Write-side wrapping with normalized errors ---

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<LegacyUser, LegacyError> {
        let identity = self.store.sign_up(email, password, name).await?;
        Ok(to_legacy_user(&identity))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<LegacySession, LegacyError> {
        let session = self.store.sign_in(email, password).await?;
        Ok(to_legacy_session(&session))
    }

    pub async fn sign_out(&self) -> Result<(), LegacyError> {
        self.store.sign_out().await.map_err(Into::into)
    }

    pub fn update_profile(&self, patch: &ProfilePatch) -> Result<LegacyProfile, LegacyError> {
        let profile = self.store.update_profile(patch)?;
        Ok(to_legacy_profile(&profile))
    }
}
