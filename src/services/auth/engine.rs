use std::fmt;

use tracing::debug;

use crate::config::AuthConfig;
use crate::services::auth::detect::{AuthDetectionResult, detect};
use crate::services::auth::token_codec::TokenCodec;
use crate::services::auth::types::{AuthErrorKind, AuthFailure, AuthMethod, AuthResult};
use crate::services::auth::verifiers::{
    BasicAuthVerifier, CredentialVerifier, JwtVerifier, PermanentTokenVerifier,
};

/// Runs the usable verifiers cheapest-first and stops at the first success.
pub struct MultiAuthEngine {
    detection: AuthDetectionResult,
    verifiers: Vec<Box<dyn CredentialVerifier>>,
}

impl fmt::Debug for MultiAuthEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiAuthEngine")
            .field("methods", &self.detection.valid)
            .finish()
    }
}

impl MultiAuthEngine {
    /// Only methods that pass detection get a verifier; the rest are never attempted.
    pub fn from_config(config: &AuthConfig) -> Self {
        let detection = detect(config);
        let mut verifiers: Vec<Box<dyn CredentialVerifier>> = Vec::new();

        for method in &detection.valid {
            match method {
                AuthMethod::PermanentToken => verifiers.push(Box::new(
                    PermanentTokenVerifier::new(config.permanent_server_tokens.iter().cloned()),
                )),
                AuthMethod::Basic => {
                    if let (Some(username), Some(password)) =
                        (&config.basic.username, &config.basic.password)
                    {
                        verifiers.push(Box::new(BasicAuthVerifier::new(
                            username.as_str(),
                            password.as_str(),
                        )));
                    }
                }
                AuthMethod::Jwt => {
                    if let Some(key) = config.jwt.encrypt_key.as_deref() {
                        let codec = TokenCodec::new(
                            key,
                            config.jwt.check_service_name,
                            config.service_name.clone(),
                        );
                        verifiers.push(Box::new(JwtVerifier::new(codec)));
                    }
                }
                // Not a config-driven method; handled by the overlay.
                AuthMethod::Custom => {}
            }
        }

        Self {
            detection,
            verifiers,
        }
    }

    /// Build from explicit verifiers (sorted into cost order here).
    pub fn with_verifiers(mut verifiers: Vec<Box<dyn CredentialVerifier>>) -> Self {
        verifiers.sort_by_key(|v| v.method());
        let detection = AuthDetectionResult {
            configured: verifiers.iter().map(|v| v.method()).collect(),
            valid: verifiers.iter().map(|v| v.method()).collect(),
            ..Default::default()
        };

        Self {
            detection,
            verifiers,
        }
    }

    pub fn detection(&self) -> &AuthDetectionResult {
        &self.detection
    }

    pub fn has_methods(&self) -> bool {
        !self.verifiers.is_empty()
    }

    pub fn authenticate(&self, credential: &str) -> AuthResult {
        if credential.trim().is_empty() {
            return Err(AuthFailure::missing_credential());
        }
        if self.verifiers.is_empty() {
            return Err(AuthFailure::no_methods_configured());
        }

        let mut attempted = Vec::with_capacity(self.verifiers.len());
        for verifier in &self.verifiers {
            let method = verifier.method();
            match verifier.verify(credential) {
                Ok(identity) => {
                    debug!(method = %method, "credential accepted");
                    return Ok(identity);
                }
                Err(failure) => {
                    // Per-method reasons stay in the logs, never in the result.
                    debug!(method = %method, kind = ?failure.kind, "credential rejected");
                    attempted.push(method.as_str());
                }
            }
        }

        Err(AuthFailure::new(
            AuthErrorKind::InvalidCredentials,
            format!("authentication failed (tried: {})", attempted.join(", ")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BasicAuthConfig, JwtTokenConfig};
    use crate::services::auth::types::{AuthIdentity, Payload, SERVER_TOKEN_USERNAME};
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingVerifier {
        method: AuthMethod,
        accept: bool,
        calls: Arc<AtomicUsize>,
    }

    impl CountingVerifier {
        fn boxed(method: AuthMethod, accept: bool) -> (Box<dyn CredentialVerifier>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let verifier = Self {
                method,
                accept,
                calls: calls.clone(),
            };
            (Box::new(verifier), calls)
        }
    }

    impl CredentialVerifier for CountingVerifier {
        fn method(&self) -> AuthMethod {
            self.method
        }

        fn verify(&self, _credential: &str) -> AuthResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.accept {
                Ok(AuthIdentity::new(self.method, "someone"))
            } else {
                Err(AuthFailure::new(AuthErrorKind::InvalidCredentials, "nope"))
            }
        }
    }

    fn example_config() -> AuthConfig {
        AuthConfig {
            permanent_server_tokens: vec!["abc123".into()],
            jwt: JwtTokenConfig {
                encrypt_key: Some("supersecretkey".into()),
                check_service_name: false,
            },
            ..AuthConfig::default()
        }
    }

    #[test]
    fn cheaper_success_short_circuits_costlier_methods() {
        let (jwt, jwt_calls) = CountingVerifier::boxed(AuthMethod::Jwt, true);
        let (token, token_calls) = CountingVerifier::boxed(AuthMethod::PermanentToken, true);
        let (basic, basic_calls) = CountingVerifier::boxed(AuthMethod::Basic, true);

        // Deliberately out of order: the engine sorts by cost.
        let engine = MultiAuthEngine::with_verifiers(vec![jwt, basic, token]);
        let identity = engine.authenticate("anything").unwrap();

        assert_eq!(identity.method, AuthMethod::PermanentToken);
        assert_eq!(token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(basic_calls.load(Ordering::SeqCst), 0);
        assert_eq!(jwt_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn falls_through_to_the_next_method_on_failure() {
        let (token, token_calls) = CountingVerifier::boxed(AuthMethod::PermanentToken, false);
        let (basic, basic_calls) = CountingVerifier::boxed(AuthMethod::Basic, true);
        let (jwt, jwt_calls) = CountingVerifier::boxed(AuthMethod::Jwt, true);

        let engine = MultiAuthEngine::with_verifiers(vec![token, basic, jwt]);
        let identity = engine.authenticate("anything").unwrap();

        assert_eq!(identity.method, AuthMethod::Basic);
        assert_eq!(token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(basic_calls.load(Ordering::SeqCst), 1);
        assert_eq!(jwt_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_credential_attempts_nothing() {
        let (token, calls) = CountingVerifier::boxed(AuthMethod::PermanentToken, true);
        let engine = MultiAuthEngine::with_verifiers(vec![token]);

        let err = engine.authenticate("").unwrap_err();

        assert_eq!(err.kind, AuthErrorKind::MissingCredential);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn no_methods_configured() {
        let engine = MultiAuthEngine::from_config(&AuthConfig::default());

        let err = engine.authenticate("abc123").unwrap_err();

        assert_eq!(err.kind, AuthErrorKind::NoMethodsConfigured);
        assert!(!engine.has_methods());
    }

    #[test]
    fn permanent_token_and_jwt_from_config() {
        let config = example_config();
        let engine = MultiAuthEngine::from_config(&config);

        let identity = engine.authenticate("abc123").unwrap();
        assert_eq!(identity.method, AuthMethod::PermanentToken);
        assert_eq!(identity.username.as_deref(), Some(SERVER_TOKEN_USERNAME));

        let codec = TokenCodec::new("supersecretkey", false, config.service_name.clone());
        let token = codec.issue("alice", 3600, Payload::new()).unwrap();
        let identity = engine.authenticate(&token).unwrap();
        assert_eq!(identity.method, AuthMethod::Jwt);
        assert_eq!(identity.username.as_deref(), Some("alice"));
    }

    #[test]
    fn total_failure_lists_attempted_methods_only() {
        let engine = MultiAuthEngine::from_config(&example_config());

        let err = engine.authenticate("wrong").unwrap_err();

        assert_eq!(err.kind, AuthErrorKind::InvalidCredentials);
        assert!(err.message.contains("permanent_token"));
        assert!(err.message.contains("jwt"));
        assert!(!err.message.contains("format"));
    }

    #[test]
    fn invalid_methods_are_never_attempted() {
        let config = AuthConfig {
            jwt: JwtTokenConfig {
                encrypt_key: Some("short".into()),
                check_service_name: false,
            },
            basic: BasicAuthConfig {
                username: Some("admin".into()),
                password: Some("pw".into()),
            },
            ..AuthConfig::default()
        };
        let engine = MultiAuthEngine::from_config(&config);

        assert_eq!(engine.detection().valid, vec![AuthMethod::Basic]);

        let err = engine.authenticate("wrong").unwrap_err();
        assert!(!err.message.contains("jwt"));

        let ok = engine.authenticate(&STANDARD.encode("admin:pw")).unwrap();
        assert_eq!(ok.method, AuthMethod::Basic);
    }
}
