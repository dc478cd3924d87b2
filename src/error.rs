//! Unified auth error model. Provider failures are typed at the adapter
//! boundary so downstream code never inspects untyped shapes.

use serde::{Deserialize, Serialize};

/// Machine-readable taxonomy for identity-provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    InvalidCredentials,
    UserAlreadyExists,
    UserNotFound,
    SessionNotFound,
    TokenExpired,
    RateLimited,
    Network,
    Internal,
    /// Provider reported something this adapter has no mapping for.
    Unrecognized,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthError {
    /// Malformed input caught before any provider call.
    #[error("{message}")]
    Validation { code: String, message: String },
    /// Structured failure reported by the identity provider, forwarded
    /// unmodified apart from typing.
    #[error("{message}")]
    Provider {
        kind: ProviderErrorKind,
        code: String,
        message: String,
    },
    /// An action required a Profile but none is loaded.
    #[error("no profile loaded")]
    NoProfile,
    /// Durable snapshot record could not be read or written.
    #[error("{message}")]
    Persist { message: String },
}

impl AuthError {
    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self {
        AuthError::Validation {
            code: code.into(),
            message: msg.into(),
        }
    }

    pub fn provider<S: Into<String>>(kind: ProviderErrorKind, code: S, msg: S) -> Self {
        AuthError::Provider {
            kind,
            code: code.into(),
            message: msg.into(),
        }
    }

    pub fn persist<S: Into<String>>(msg: S) -> Self {
        AuthError::Persist {
            message: msg.into(),
        }
    }

    pub fn code_str(&self) -> &str {
        match self {
            AuthError::Validation { code, .. } | AuthError::Provider { code, .. } => code.as_str(),
            AuthError::NoProfile => "no_profile",
            AuthError::Persist { .. } => "persist",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Provider kind when this is a provider failure.
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            AuthError::Provider { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// "Not logged in" as reported by a refresh is an expected state, not a
    /// fault (see the store's refresh actions).
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self.provider_kind(),
            Some(
                ProviderErrorKind::SessionNotFound
                    | ProviderErrorKind::InvalidCredentials
                    | ProviderErrorKind::TokenExpired
            )
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Provider {
            kind: ProviderErrorKind::Network,
            code: "network".into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_message_accessors() {
        let e = AuthError::validation("empty_email", "Email is required");
        assert_eq!(e.code_str(), "empty_email");
        assert_eq!(e.message(), "Email is required");
        assert_eq!(e.provider_kind(), None);
    }

    #[test]
    fn provider_kind_is_exposed() {
        let e = AuthError::provider(
            ProviderErrorKind::UserAlreadyExists,
            "user_already_exists",
            "A user with the same email already exists",
        );
        assert_eq!(e.provider_kind(), Some(ProviderErrorKind::UserAlreadyExists));
        assert!(!e.is_unauthenticated());
    }

    #[test]
    fn unauthenticated_kinds() {
        for kind in [
            ProviderErrorKind::SessionNotFound,
            ProviderErrorKind::InvalidCredentials,
            ProviderErrorKind::TokenExpired,
        ] {
            assert!(AuthError::provider(kind, "c", "m").is_unauthenticated());
        }
        assert!(!AuthError::provider(ProviderErrorKind::Network, "c", "m").is_unauthenticated());
    }
}
