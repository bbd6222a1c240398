//! One verifier per credential format. All of them are pure and synchronous.

use std::collections::HashSet;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::services::auth::token_codec::TokenCodec;
use crate::services::auth::types::{
    AuthErrorKind, AuthFailure, AuthIdentity, AuthMethod, AuthResult, SERVER_TOKEN_USERNAME,
};

/// A single credential check. The engine calls these in cost order.
pub trait CredentialVerifier: Send + Sync {
    fn method(&self) -> AuthMethod;

    fn verify(&self, credential: &str) -> AuthResult;
}

/// Exact membership in the configured server token set.
pub struct PermanentTokenVerifier {
    tokens: HashSet<String>,
}

impl PermanentTokenVerifier {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokens
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.trim().is_empty())
            .collect();
        Self { tokens }
    }
}

impl CredentialVerifier for PermanentTokenVerifier {
    fn method(&self) -> AuthMethod {
        AuthMethod::PermanentToken
    }

    fn verify(&self, credential: &str) -> AuthResult {
        if self.tokens.contains(credential) {
            Ok(AuthIdentity::new(
                AuthMethod::PermanentToken,
                SERVER_TOKEN_USERNAME,
            ))
        } else {
            Err(AuthFailure::new(
                AuthErrorKind::InvalidCredentials,
                "unknown server token",
            ))
        }
    }
}

/// `base64(username:password)` against one configured pair.
pub struct BasicAuthVerifier {
    username: String,
    password: String,
}

impl BasicAuthVerifier {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialVerifier for BasicAuthVerifier {
    fn method(&self) -> AuthMethod {
        AuthMethod::Basic
    }

    fn verify(&self, credential: &str) -> AuthResult {
        let invalid_format =
            || AuthFailure::new(AuthErrorKind::InvalidFormat, "malformed basic credential");

        let decoded = STANDARD
            .decode(credential.trim())
            .map_err(|_| invalid_format())?;
        let decoded = String::from_utf8(decoded).map_err(|_| invalid_format())?;

        let (username, password) = decoded.split_once(':').ok_or_else(invalid_format)?;
        if username.is_empty() || password.is_empty() {
            return Err(invalid_format());
        }

        // Evaluate both comparisons so timing does not reveal which half matched.
        let user_ok = constant_time_eq(username, &self.username);
        let pass_ok = constant_time_eq(password, &self.password);

        if user_ok & pass_ok {
            Ok(AuthIdentity::new(AuthMethod::Basic, username))
        } else {
            Err(AuthFailure::new(
                AuthErrorKind::InvalidCredentials,
                "invalid username or password",
            ))
        }
    }
}

/// Symmetric self-contained token, see [`TokenCodec`].
pub struct JwtVerifier {
    codec: TokenCodec,
}

impl JwtVerifier {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }
}

impl CredentialVerifier for JwtVerifier {
    fn method(&self) -> AuthMethod {
        AuthMethod::Jwt
    }

    fn verify(&self, credential: &str) -> AuthResult {
        self.codec.verify(credential)
    }
}

/// Constant-time string comparison
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }

    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}
