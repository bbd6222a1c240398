/*
 * Responsibility
 * - 認証結果の型 (AuthMethod / AuthIdentity / AuthFailure / AuthResult)
 * - verifier・engine・overlay の全てがこの型で結果を返す (例外的な error 伝播はしない)
 *
 * Notes
 * - AuthResult = Result<AuthIdentity, AuthFailure> なので「成功なのに error がある」状態は作れない
 */
use std::fmt;

use serde::Serialize;

/// Free-form claims carried by a token or produced by a custom validator.
pub type Payload = serde_json::Map<String, serde_json::Value>;

pub type AuthResult = Result<AuthIdentity, AuthFailure>;

/// Username reported for permanent server tokens (no identity is recoverable).
pub const SERVER_TOKEN_USERNAME: &str = "ServerToken";

/// Verification strategy. Variant order is the ascending CPU cost order used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    PermanentToken,
    Basic,
    Jwt,
    Custom,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::PermanentToken => "permanent_token",
            AuthMethod::Basic => "basic",
            AuthMethod::Jwt => "jwt",
            AuthMethod::Custom => "custom",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful authentication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthIdentity {
    pub method: AuthMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub payload: Payload,
}

impl AuthIdentity {
    pub fn new(method: AuthMethod, username: impl Into<String>) -> Self {
        Self {
            method,
            username: Some(username.into()),
            payload: Payload::new(),
        }
    }

    pub fn anonymous(method: AuthMethod) -> Self {
        Self {
            method,
            username: None,
            payload: Payload::new(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Merge `refined` over `self`: the refined side wins on every conflicting field.
    pub fn merged_with(mut self, refined: AuthIdentity) -> Self {
        self.method = refined.method;
        if refined.username.is_some() {
            self.username = refined.username;
        }
        for (key, value) in refined.payload {
            self.payload.insert(key, value);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthErrorKind {
    MissingCredential,
    InvalidFormat,
    Expired,
    InvalidSignature,
    ServiceMismatch,
    InvalidCredentials,
    NoMethodsConfigured,
}

/// Failed authentication. Only carries the reason, never a partial identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct AuthFailure {
    pub kind: AuthErrorKind,
    pub message: String,
}

impl AuthFailure {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_credential() -> Self {
        Self::new(AuthErrorKind::MissingCredential, "no credential provided")
    }

    pub fn no_methods_configured() -> Self {
        Self::new(
            AuthErrorKind::NoMethodsConfigured,
            "no authentication method is configured",
        )
    }
}
