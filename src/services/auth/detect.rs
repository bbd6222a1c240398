//! Which auth methods are configured, and which of those are actually usable.
//!
//! "configured" = something was set in config.
//! "valid"      = configured and internally consistent; only these are ever attempted.
//! The gap between the two is reported as configuration errors (diagnostics only).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::AuthConfig;
use crate::services::auth::types::AuthMethod;

pub const MIN_ENCRYPT_KEY_LEN: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthDetectionResult {
    pub configured: Vec<AuthMethod>,
    // Cost-ordered.
    pub valid: Vec<AuthMethod>,
    pub errors: BTreeMap<AuthMethod, Vec<String>>,
}

impl AuthDetectionResult {
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    pub fn is_valid(&self, method: AuthMethod) -> bool {
        self.valid.contains(&method)
    }

    fn record(&mut self, method: AuthMethod, problems: Vec<String>) {
        self.configured.push(method);
        if problems.is_empty() {
            self.valid.push(method);
        } else {
            self.errors.insert(method, problems);
        }
    }
}

/// Recomputed from config every time it is called; nothing is cached here.
pub fn detect(config: &AuthConfig) -> AuthDetectionResult {
    let mut result = AuthDetectionResult::default();

    if !config.permanent_server_tokens.is_empty() {
        let mut problems = Vec::new();
        if config
            .permanent_server_tokens
            .iter()
            .all(|t| t.trim().is_empty())
        {
            problems.push("permanentServerTokens contains only empty entries".to_string());
        }
        result.record(AuthMethod::PermanentToken, problems);
    }

    if let Some(key) = config.jwt.encrypt_key.as_deref() {
        let mut problems = Vec::new();
        let len = key.chars().count();
        if len < MIN_ENCRYPT_KEY_LEN {
            problems.push(format!(
                "jwtToken.encryptKey must be at least {} characters (got {})",
                MIN_ENCRYPT_KEY_LEN, len
            ));
        }
        result.record(AuthMethod::Jwt, problems);
    }

    let basic = &config.basic;
    if basic.username.is_some() || basic.password.is_some() {
        let mut problems = Vec::new();
        if basic.username.is_none() {
            problems.push("basic.username is required when basic.password is set".to_string());
        }
        if basic.password.is_none() {
            problems.push("basic.password is required when basic.username is set".to_string());
        }
        result.record(AuthMethod::Basic, problems);
    }

    result.configured.sort();
    result.valid.sort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BasicAuthConfig, JwtTokenConfig};

    fn config() -> AuthConfig {
        AuthConfig::default()
    }

    #[test]
    fn nothing_configured() {
        let result = detect(&config());

        assert!(result.is_empty());
        assert!(result.configured.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn all_methods_valid_in_cost_order() {
        let config = AuthConfig {
            permanent_server_tokens: vec!["abc123".into()],
            jwt: JwtTokenConfig {
                encrypt_key: Some("supersecretkey".into()),
                check_service_name: false,
            },
            basic: BasicAuthConfig {
                username: Some("admin".into()),
                password: Some("pw".into()),
            },
            ..config()
        };

        let result = detect(&config);

        assert_eq!(
            result.valid,
            vec![AuthMethod::PermanentToken, AuthMethod::Basic, AuthMethod::Jwt]
        );
        assert_eq!(result.configured, result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn short_key_is_configured_but_not_valid() {
        let config = AuthConfig {
            jwt: JwtTokenConfig {
                encrypt_key: Some("short".into()),
                check_service_name: false,
            },
            ..config()
        };

        let result = detect(&config);

        assert_eq!(result.configured, vec![AuthMethod::Jwt]);
        assert!(result.valid.is_empty());
        assert!(result.errors[&AuthMethod::Jwt][0].contains("at least 8"));
    }

    #[test]
    fn key_of_exactly_minimum_length_is_valid() {
        let config = AuthConfig {
            jwt: JwtTokenConfig {
                encrypt_key: Some("12345678".into()),
                check_service_name: false,
            },
            ..config()
        };

        assert!(detect(&config).is_valid(AuthMethod::Jwt));
    }

    #[test]
    fn basic_needs_both_halves() {
        let config = AuthConfig {
            basic: BasicAuthConfig {
                username: Some("admin".into()),
                password: None,
            },
            ..config()
        };

        let result = detect(&config);

        assert_eq!(result.configured, vec![AuthMethod::Basic]);
        assert!(!result.is_valid(AuthMethod::Basic));
        assert_eq!(result.errors[&AuthMethod::Basic].len(), 1);
    }

    #[test]
    fn blank_tokens_are_not_valid() {
        let config = AuthConfig {
            permanent_server_tokens: vec!["".into(), "  ".into()],
            ..config()
        };

        let result = detect(&config);

        assert_eq!(result.configured, vec![AuthMethod::PermanentToken]);
        assert!(result.valid.is_empty());
    }
}
