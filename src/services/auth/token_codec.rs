//! Self-contained symmetric bearer tokens (the "jwt" auth method).
//!
//! Wire format: `<expiryEpochSeconds>.<base64url(nonce || AES-256-GCM ciphertext)>`
//!
//! - The expiry prefix is plain text so expired tokens are rejected before any crypto work.
//! - The prefix is also bound as AEAD associated data, so editing it breaks decryption.
//! - Issuer and verifier are the same process, so a shared key is enough (no key distribution).

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload as AeadPayload},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::services::auth::types::{
    AuthErrorKind, AuthFailure, AuthIdentity, AuthMethod, AuthResult, Payload,
};

const NONCE_LEN: usize = 12;
const DELIMITER: char = '.';

const CLAIM_USER: &str = "user";
const CLAIM_EXP: &str = "exp";
const CLAIM_SERVICE: &str = "service";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token user must not be empty")]
    EmptyUser,
    #[error("token lifetime is out of range")]
    LifetimeOutOfRange,
    #[error("failed to serialize token payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to encrypt token payload")]
    Encrypt,
}

#[derive(Clone)]
pub struct TokenCodec {
    cipher: Aes256Gcm,
    check_service_name: bool,
    service_name: String,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenCodec")
            .field("check_service_name", &self.check_service_name)
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// The AES key is SHA-256 of `encrypt_key`, so any configured string length works.
    /// Minimum length policy lives in the config detector, not here.
    pub fn new(encrypt_key: &str, check_service_name: bool, service_name: impl Into<String>) -> Self {
        let digest = Sha256::digest(encrypt_key.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(digest.as_slice());

        Self {
            cipher: Aes256Gcm::new(key),
            check_service_name,
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Issue a token for `user` valid for `lifetime_seconds` from now.
    pub fn issue(
        &self,
        user: &str,
        lifetime_seconds: u64,
        extra_payload: Payload,
    ) -> Result<String, TokenError> {
        self.issue_at(Utc::now().timestamp(), user, lifetime_seconds, extra_payload)
    }

    pub fn issue_at(
        &self,
        now: i64,
        user: &str,
        lifetime_seconds: u64,
        extra_payload: Payload,
    ) -> Result<String, TokenError> {
        if user.trim().is_empty() {
            return Err(TokenError::EmptyUser);
        }

        let lifetime =
            i64::try_from(lifetime_seconds).map_err(|_| TokenError::LifetimeOutOfRange)?;
        let exp = now
            .checked_add(lifetime)
            .ok_or(TokenError::LifetimeOutOfRange)?;

        // Reserved claims always win over caller-supplied extras.
        let mut claims = extra_payload;
        claims.insert(CLAIM_USER.to_string(), Value::String(user.to_string()));
        claims.insert(CLAIM_EXP.to_string(), Value::from(exp));
        claims.insert(
            CLAIM_SERVICE.to_string(),
            Value::String(self.service_name.clone()),
        );

        let plaintext = serde_json::to_vec(&claims)?;
        let exp_text = exp.to_string();

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                AeadPayload {
                    msg: &plaintext,
                    aad: exp_text.as_bytes(),
                },
            )
            .map_err(|_| TokenError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);

        Ok(format!(
            "{}{}{}",
            exp_text,
            DELIMITER,
            URL_SAFE_NO_PAD.encode(sealed)
        ))
    }

    pub fn verify(&self, token: &str) -> AuthResult {
        self.verify_at(Utc::now().timestamp(), token)
    }

    pub fn verify_at(&self, now: i64, token: &str) -> AuthResult {
        let (exp_text, body) = token.split_once(DELIMITER).ok_or_else(|| {
            AuthFailure::new(
                AuthErrorKind::InvalidFormat,
                "token is not in <expiry>.<body> form",
            )
        })?;

        let exp = parse_expiry(exp_text)?;

        // Cheap rejection: no decryption for expired tokens.
        // Valid strictly before `exp`; at `issue + ttl` the token is already dead.
        if exp <= now {
            return Err(AuthFailure::new(AuthErrorKind::Expired, "token has expired"));
        }

        let sealed = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| invalid_signature())?;
        if sealed.len() <= NONCE_LEN {
            return Err(invalid_signature());
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                AeadPayload {
                    msg: ciphertext,
                    aad: exp_text.as_bytes(),
                },
            )
            .map_err(|_| invalid_signature())?;

        let mut claims: Payload = serde_json::from_slice(&plaintext).map_err(|_| {
            AuthFailure::new(AuthErrorKind::InvalidFormat, "token payload is not an object")
        })?;

        if claims.remove(CLAIM_EXP).and_then(|v| v.as_i64()) != Some(exp) {
            return Err(AuthFailure::new(
                AuthErrorKind::InvalidFormat,
                "token payload expiry does not match its prefix",
            ));
        }

        let user = match claims.remove(CLAIM_USER) {
            Some(Value::String(user)) if !user.trim().is_empty() => user,
            _ => {
                return Err(AuthFailure::new(
                    AuthErrorKind::InvalidFormat,
                    "token payload has no user",
                ));
            }
        };

        let service = claims.remove(CLAIM_SERVICE);
        if self.check_service_name
            && service.as_ref().and_then(Value::as_str) != Some(self.service_name.as_str())
        {
            return Err(AuthFailure::new(
                AuthErrorKind::ServiceMismatch,
                "token was issued for a different service",
            ));
        }

        Ok(AuthIdentity::new(AuthMethod::Jwt, user).with_payload(claims))
    }
}

fn parse_expiry(raw: &str) -> Result<i64, AuthFailure> {
    let malformed = || AuthFailure::new(AuthErrorKind::InvalidFormat, "malformed token expiry");

    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    raw.parse::<i64>().map_err(|_| malformed())
}

fn invalid_signature() -> AuthFailure {
    AuthFailure::new(
        AuthErrorKind::InvalidSignature,
        "token could not be decrypted",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::new("supersecretkey", false, "mcp-server")
    }

    fn payload(pairs: &[(&str, Value)]) -> Payload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn issue_then_verify_returns_user_and_payload() {
        let codec = codec();
        let extra = payload(&[("role", json!("admin")), ("tenant", json!(42))]);

        let token = codec.issue_at(NOW, "alice", 3600, extra).unwrap();
        let identity = codec.verify_at(NOW, &token).unwrap();

        assert_eq!(identity.method, AuthMethod::Jwt);
        assert_eq!(identity.username.as_deref(), Some("alice"));
        assert_eq!(identity.payload["role"], json!("admin"));
        assert_eq!(identity.payload["tenant"], json!(42));
        assert!(!identity.payload.contains_key("user"));
        assert!(!identity.payload.contains_key("exp"));
    }

    #[test]
    fn expiry_prefix_is_readable_without_key() {
        let token = codec().issue_at(NOW, "alice", 60, Payload::new()).unwrap();
        let (prefix, _) = token.split_once('.').unwrap();

        assert_eq!(prefix, (NOW + 60).to_string());
    }

    #[test]
    fn expired_token_is_rejected_without_the_right_key() {
        let token = codec().issue_at(NOW, "alice", 3600, Payload::new()).unwrap();

        // A codec with a different key never gets as far as decrypting.
        let stranger = TokenCodec::new("a-completely-different-key", false, "mcp-server");
        let err = stranger.verify_at(NOW + 3601, &token).unwrap_err();

        assert_eq!(err.kind, AuthErrorKind::Expired);
    }

    #[test]
    fn expires_once_the_lifetime_has_elapsed() {
        let codec = codec();
        let token = codec.issue_at(NOW, "alice", 10, Payload::new()).unwrap();

        assert!(codec.verify_at(NOW + 9, &token).is_ok());
        assert_eq!(
            codec.verify_at(NOW + 10, &token).unwrap_err().kind,
            AuthErrorKind::Expired
        );
    }

    #[test]
    fn wrong_key_is_invalid_signature() {
        let token = codec().issue_at(NOW, "alice", 3600, Payload::new()).unwrap();
        let stranger = TokenCodec::new("a-completely-different-key", false, "mcp-server");

        assert_eq!(
            stranger.verify_at(NOW, &token).unwrap_err().kind,
            AuthErrorKind::InvalidSignature
        );
    }

    #[test]
    fn tampering_any_body_character_is_invalid_signature() {
        let codec = codec();
        let token = codec.issue_at(NOW, "alice", 3600, Payload::new()).unwrap();
        let body_start = token.find('.').unwrap() + 1;

        for index in body_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            let err = codec.verify_at(NOW, &tampered).unwrap_err();
            assert_eq!(err.kind, AuthErrorKind::InvalidSignature, "index {index}");
        }
    }

    #[test]
    fn extending_the_expiry_prefix_breaks_the_token() {
        let codec = codec();
        let token = codec.issue_at(NOW, "alice", 60, Payload::new()).unwrap();
        let (_, body) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", NOW + 999_999, body);

        assert_eq!(
            codec.verify_at(NOW, &forged).unwrap_err().kind,
            AuthErrorKind::InvalidSignature
        );
    }

    #[test]
    fn malformed_prefix_is_invalid_format() {
        let codec = codec();

        for token in ["", "no-delimiter", "abc.def", "-5.xyz", ".body", "12e3.body"] {
            assert_eq!(
                codec.verify_at(NOW, token).unwrap_err().kind,
                AuthErrorKind::InvalidFormat,
                "{token}"
            );
        }
    }

    #[test]
    fn service_name_is_checked_when_enabled() {
        let issuer = TokenCodec::new("supersecretkey", false, "billing");
        let token = issuer.issue_at(NOW, "alice", 60, Payload::new()).unwrap();

        let strict = TokenCodec::new("supersecretkey", true, "weather");
        assert_eq!(
            strict.verify_at(NOW, &token).unwrap_err().kind,
            AuthErrorKind::ServiceMismatch
        );

        let lenient = TokenCodec::new("supersecretkey", false, "weather");
        assert!(lenient.verify_at(NOW, &token).is_ok());

        let same = TokenCodec::new("supersecretkey", true, "billing");
        assert!(same.verify_at(NOW, &token).is_ok());
    }

    #[test]
    fn reserved_claims_cannot_be_overridden_by_extras() {
        let codec = codec();
        let extra = payload(&[("user", json!("mallory")), ("exp", json!(1))]);

        let token = codec.issue_at(NOW, "alice", 60, extra).unwrap();
        let identity = codec.verify_at(NOW, &token).unwrap();

        assert_eq!(identity.username.as_deref(), Some("alice"));
    }

    #[test]
    fn empty_user_is_refused_at_issue_time() {
        assert!(matches!(
            codec().issue_at(NOW, "  ", 60, Payload::new()),
            Err(TokenError::EmptyUser)
        ));
    }
}
