//! Core auth data model: Identity, Session, Profile and the observable Snapshot.
//! Identity/Session are provider-issued; Profile is the application's own record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a session was established at the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthMethod {
    Password,
    OAuth { provider: String },
    MagicUrl,
    Phone,
}

/// Best-effort device/client/network metadata attached to a session.
/// Informational only; never used for access decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAttrs {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

/// The authenticated principal as issued by the identity provider.
/// Replaced wholesale on sign-in/out; mutated only through explicit update actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub phone_verified: bool,
    #[serde(default)]
    pub mfa_enabled: bool,
    /// Free-form provider-side preference map.
    #[serde(default)]
    pub prefs: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
}

/// One active login at the provider. An identity may hold several; `current`
/// marks the one this client authenticates with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expire: DateTime<Utc>,
    pub method: AuthMethod,
    #[serde(default)]
    pub attrs: SessionAttrs,
    #[serde(default)]
    pub current: bool,
    /// Provider-issued request credential. Persisted so a restarted process can
    /// resume the session; never exposed through the facade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire <= now
    }
}

/// Application-owned user record layered over Identity. Loosely linked by id
/// and allowed to diverge from Identity fields (e.g. display name).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_professional: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Partial profile update; `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_professional: Option<bool>,
    #[serde(default)]
    pub is_verified: Option<bool>,
}

impl Profile {
    /// Merge a partial update into this profile. Unset patch fields keep the
    /// existing value.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(v) = &patch.full_name {
            self.full_name = v.clone();
        }
        if let Some(v) = &patch.email {
            self.email = Some(v.clone());
        }
        if let Some(v) = &patch.phone {
            self.phone = Some(v.clone());
        }
        if let Some(v) = &patch.address {
            self.address = Some(v.clone());
        }
        if let Some(v) = &patch.city {
            self.city = Some(v.clone());
        }
        if let Some(v) = &patch.avatar_url {
            self.avatar_url = Some(v.clone());
        }
        if let Some(v) = patch.is_professional {
            self.is_professional = v;
        }
        if let Some(v) = patch.is_verified {
            self.is_verified = v;
        }
    }

    /// Minimal profile synthesized from a provider identity when the
    /// application backend has no record for it yet. Full name falls back to
    /// the local part of the email when the identity carries no name.
    pub fn synthesize(identity: &Identity) -> Self {
        let full_name = if identity.name.trim().is_empty() {
            identity
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        } else {
            identity.name.clone()
        };
        Profile {
            id: identity.id.clone(),
            full_name,
            email: Some(identity.email.clone()),
            phone: identity.phone.clone(),
            ..Default::default()
        }
    }
}

/// The entire observable state of the session store. Identity and Session are
/// both present or both absent; `loading` covers the transient window while an
/// action is in flight and the previous committed triple stays visible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub identity: Option<Identity>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub test_mode: bool,
}

impl Snapshot {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some() && self.session.is_some()
    }
}
