//! HTTP adapter for the hosted identity API. Owns the wire shapes and the
//! mapping from provider error bodies to the typed taxonomy; nothing outside
//! this module sees a raw response.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{IdentityProvider, Jwt, OAuthProvider, SignUpRequest, TokenHandle};
use crate::config::AuthConfig;
use crate::error::{AuthError, ProviderErrorKind};
use crate::model::{AuthMethod, Identity, Session, SessionAttrs};

const SESSION_HEADER: &str = "x-alkabir-session";
const PROJECT_HEADER: &str = "x-alkabir-project";

// --- Wire shapes (provider-owned field naming) ---

#[derive(Debug, Deserialize)]
struct WireUser {
    #[serde(rename = "$id")]
    id: String,
    #[serde(rename = "$createdAt")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    name: String,
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(rename = "emailVerification", default)]
    email_verification: bool,
    #[serde(rename = "phoneVerification", default)]
    phone_verification: bool,
    #[serde(default)]
    mfa: bool,
    #[serde(default)]
    prefs: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "accessedAt", default)]
    accessed_at: Option<DateTime<Utc>>,
}

impl From<WireUser> for Identity {
    fn from(w: WireUser) -> Self {
        Identity {
            id: w.id,
            name: w.name,
            email: w.email,
            phone: if w.phone.is_empty() { None } else { Some(w.phone) },
            email_verified: w.email_verification,
            phone_verified: w.phone_verification,
            mfa_enabled: w.mfa,
            prefs: w.prefs,
            accessed_at: w.accessed_at.unwrap_or(w.created_at),
            created_at: w.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSession {
    #[serde(rename = "$id")]
    id: String,
    #[serde(rename = "userId")]
    user_id: String,
    expire: DateTime<Utc>,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    current: bool,
    #[serde(default)]
    secret: String,
    #[serde(rename = "deviceName", default)]
    device_name: Option<String>,
    #[serde(rename = "clientName", default)]
    client_name: Option<String>,
    #[serde(default)]
    ip: Option<String>,
}

impl From<WireSession> for Session {
    fn from(w: WireSession) -> Self {
        let method = match w.provider.as_str() {
            "" | "email" | "password" => AuthMethod::Password,
            "magic-url" => AuthMethod::MagicUrl,
            "phone" => AuthMethod::Phone,
            other => AuthMethod::OAuth {
                provider: other.to_string(),
            },
        };
        Session {
            id: w.id,
            user_id: w.user_id,
            expire: w.expire,
            method,
            attrs: SessionAttrs {
                device: w.device_name,
                client: w.client_name,
                ip: w.ip,
            },
            current: w.current,
            secret: if w.secret.is_empty() { None } else { Some(w.secret) },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSessionList {
    sessions: Vec<WireSession>,
}

#[derive(Debug, Deserialize)]
struct WireToken {
    #[serde(rename = "$id")]
    id: String,
    #[serde(rename = "userId")]
    user_id: String,
}

impl From<WireToken> for TokenHandle {
    fn from(w: WireToken) -> Self {
        TokenHandle {
            id: w.id,
            user_id: w.user_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Map the provider's `{message, type}` error body plus HTTP status to the
/// typed taxonomy. Unknown type strings fall back to the status class.
fn map_error(status: StatusCode, body: WireError) -> AuthError {
    let kind = match body.kind.as_str() {
        "user_already_exists" | "user_email_already_exists" | "user_phone_already_exists" => {
            ProviderErrorKind::UserAlreadyExists
        }
        "user_invalid_credentials" | "user_invalid_token" | "user_password_mismatch" => {
            ProviderErrorKind::InvalidCredentials
        }
        "user_not_found" => ProviderErrorKind::UserNotFound,
        "user_session_not_found" | "general_unauthorized_scope" => {
            ProviderErrorKind::SessionNotFound
        }
        "user_jwt_invalid" | "user_token_expired" => ProviderErrorKind::TokenExpired,
        "general_rate_limit_exceeded" => ProviderErrorKind::RateLimited,
        _ => match status {
            StatusCode::UNAUTHORIZED => ProviderErrorKind::SessionNotFound,
            StatusCode::CONFLICT => ProviderErrorKind::UserAlreadyExists,
            StatusCode::TOO_MANY_REQUESTS => ProviderErrorKind::RateLimited,
            s if s.is_server_error() => ProviderErrorKind::Internal,
            _ => ProviderErrorKind::Unrecognized,
        },
    };
    let code = if body.kind.is_empty() {
        status.as_u16().to_string()
    } else {
        body.kind
    };
    let message = if body.message.is_empty() {
        format!("identity provider returned HTTP {}", status.as_u16())
    } else {
        body.message
    };
    AuthError::provider(kind, code, message)
}

/// Live adapter over the hosted identity API. Carries the current session
/// secret as an ambient credential for authenticated calls.
pub struct LiveProvider {
    base: String,
    project: String,
    client: reqwest::Client,
    session_secret: RwLock<Option<String>>,
}

impl LiveProvider {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            base: config.endpoint.trim_end_matches('/').to_string(),
            project: config.project.clone(),
            client,
            session_secret: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn adopt_secret(&self, session: &Session) {
        if let Some(secret) = &session.secret {
            *self.session_secret.write() = Some(secret.clone());
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, AuthError> {
        let mut req = self
            .client
            .request(method, self.url(path))
            .header(PROJECT_HEADER, &self.project);
        if let Some(secret) = self.session_secret.read().clone() {
            req = req.header(SESSION_HEADER, secret);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body: WireError = resp.json().await.unwrap_or_default();
        let err = map_error(status, body);
        tracing::debug!(
            "auth.provider error path={} status={} code={}",
            path,
            status.as_u16(),
            err.code_str()
        );
        Err(err)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, AuthError> {
        let resp = self.send(method, path, body).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn send_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), AuthError> {
        let _ = self.send(method, path, body).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for LiveProvider {
    async fn create_account(&self, req: &SignUpRequest) -> Result<Identity, AuthError> {
        let body = serde_json::json!({
            "userId": "unique()",
            "email": req.email,
            "password": req.password,
            "name": req.name,
        });
        let user: WireUser = self
            .send_json(Method::POST, "/account", Some(body))
            .await?;
        Ok(user.into())
    }

    async fn create_email_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let body = serde_json::json!({"email": email, "password": password});
        let wire: WireSession = self
            .send_json(Method::POST, "/account/sessions/email", Some(body))
            .await?;
        let session: Session = wire.into();
        self.adopt_secret(&session);
        Ok(session)
    }

    fn oauth_redirect_url(&self, provider: OAuthProvider, success: &str, failure: &str) -> String {
        format!(
            "{}/account/sessions/oauth2/{}?project={}&success={}&failure={}",
            self.base,
            provider.as_str(),
            urlencoding::encode(&self.project),
            urlencoding::encode(success),
            urlencoding::encode(failure)
        )
    }

    async fn create_magic_url_token(
        &self,
        email: &str,
        url: &str,
    ) -> Result<TokenHandle, AuthError> {
        let body = serde_json::json!({"userId": "unique()", "email": email, "url": url});
        let tok: WireToken = self
            .send_json(Method::POST, "/account/tokens/magic-url", Some(body))
            .await?;
        Ok(tok.into())
    }

    async fn create_phone_token(&self, phone: &str) -> Result<TokenHandle, AuthError> {
        let body = serde_json::json!({"userId": "unique()", "phone": phone});
        let tok: WireToken = self
            .send_json(Method::POST, "/account/tokens/phone", Some(body))
            .await?;
        Ok(tok.into())
    }

    async fn get_account(&self) -> Result<Identity, AuthError> {
        let user: WireUser = self.send_json(Method::GET, "/account", None).await?;
        Ok(user.into())
    }

    async fn get_session(&self) -> Result<Session, AuthError> {
        let wire: WireSession = self
            .send_json(Method::GET, "/account/sessions/current", None)
            .await?;
        Ok(wire.into())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, AuthError> {
        let list: WireSessionList = self
            .send_json(Method::GET, "/account/sessions", None)
            .await?;
        Ok(list.sessions.into_iter().map(Into::into).collect())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), AuthError> {
        let path = format!("/account/sessions/{}", urlencoding::encode(session_id));
        self.send_empty(Method::DELETE, &path, None).await?;
        if session_id == "current" {
            *self.session_secret.write() = None;
        }
        Ok(())
    }

    async fn delete_sessions(&self) -> Result<(), AuthError> {
        self.send_empty(Method::DELETE, "/account/sessions", None)
            .await?;
        *self.session_secret.write() = None;
        Ok(())
    }

    async fn update_password(
        &self,
        password: &str,
        old_password: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let mut body = serde_json::json!({"password": password});
        if let Some(old) = old_password {
            body["oldPassword"] = serde_json::Value::String(old.to_string());
        }
        let user: WireUser = self
            .send_json(Method::PATCH, "/account/password", Some(body))
            .await?;
        Ok(user.into())
    }

    async fn update_email(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let body = serde_json::json!({"email": email, "password": password});
        let user: WireUser = self
            .send_json(Method::PATCH, "/account/email", Some(body))
            .await?;
        Ok(user.into())
    }

    async fn update_phone(&self, phone: &str, password: &str) -> Result<Identity, AuthError> {
        let body = serde_json::json!({"phone": phone, "password": password});
        let user: WireUser = self
            .send_json(Method::PATCH, "/account/phone", Some(body))
            .await?;
        Ok(user.into())
    }

    async fn update_name(&self, name: &str) -> Result<Identity, AuthError> {
        let body = serde_json::json!({"name": name});
        let user: WireUser = self
            .send_json(Method::PATCH, "/account/name", Some(body))
            .await?;
        Ok(user.into())
    }

    async fn update_prefs(
        &self,
        prefs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Identity, AuthError> {
        let body = serde_json::json!({"prefs": prefs});
        let user: WireUser = self
            .send_json(Method::PATCH, "/account/prefs", Some(body))
            .await?;
        Ok(user.into())
    }

    async fn create_email_verification(&self, url: &str) -> Result<TokenHandle, AuthError> {
        let body = serde_json::json!({"url": url});
        let tok: WireToken = self
            .send_json(Method::POST, "/account/verification", Some(body))
            .await?;
        Ok(tok.into())
    }

    async fn confirm_email_verification(
        &self,
        user_id: &str,
        secret: &str,
    ) -> Result<(), AuthError> {
        let body = serde_json::json!({"userId": user_id, "secret": secret});
        self.send_empty(Method::PUT, "/account/verification", Some(body))
            .await
    }

    async fn create_phone_verification(&self) -> Result<TokenHandle, AuthError> {
        let tok: WireToken = self
            .send_json(Method::POST, "/account/verification/phone", None)
            .await?;
        Ok(tok.into())
    }

    async fn confirm_phone_verification(
        &self,
        user_id: &str,
        secret: &str,
    ) -> Result<(), AuthError> {
        let body = serde_json::json!({"userId": user_id, "secret": secret});
        self.send_empty(Method::PUT, "/account/verification/phone", Some(body))
            .await
    }

    async fn create_password_recovery(
        &self,
        email: &str,
        url: &str,
    ) -> Result<TokenHandle, AuthError> {
        let body = serde_json::json!({"email": email, "url": url});
        let tok: WireToken = self
            .send_json(Method::POST, "/account/recovery", Some(body))
            .await?;
        Ok(tok.into())
    }

    async fn confirm_password_recovery(
        &self,
        user_id: &str,
        secret: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let body = serde_json::json!({"userId": user_id, "secret": secret, "password": password});
        self.send_empty(Method::PUT, "/account/recovery", Some(body))
            .await
    }

    async fn create_jwt(&self) -> Result<Jwt, AuthError> {
        self.send_json(Method::POST, "/account/jwt", None).await
    }

    fn restore(&self, session: &Session) {
        self.adopt_secret(session);
    }
}
