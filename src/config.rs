//! Store configuration. Values come from the embedding application; this
//! crate never reads the environment itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Base URL of the hosted identity provider, e.g. "https://id.alkabir.ae/v1".
    pub endpoint: String,
    /// Project identifier sent with every provider request.
    pub project: String,
    /// Origin of the embedding application, used to derive default redirect URLs.
    pub origin: String,
    /// Path appended to `origin` when an OAuth flow succeeds.
    pub oauth_success_path: String,
    /// Path appended to `origin` when an OAuth flow fails.
    pub oauth_failure_path: String,
    /// Where the durable snapshot record lives. `None` disables persistence.
    pub persist_path: Option<PathBuf>,
    /// Per-request timeout for provider calls, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://id.alkabir.ae/v1".to_string(),
            project: "alkabir".to_string(),
            origin: "https://alkabir.ae".to_string(),
            oauth_success_path: "/auth/callback".to_string(),
            oauth_failure_path: "/auth/error".to_string(),
            persist_path: None,
            request_timeout_ms: 15_000,
        }
    }
}

impl AuthConfig {
    /// Default OAuth success URL: `<origin>/auth/callback`.
    pub fn oauth_success_url(&self) -> String {
        format!("{}{}", self.origin.trim_end_matches('/'), self.oauth_success_path)
    }

    /// Default OAuth failure URL: `<origin>/auth/error`.
    pub fn oauth_failure_url(&self) -> String {
        format!("{}{}", self.origin.trim_end_matches('/'), self.oauth_failure_path)
    }
}
