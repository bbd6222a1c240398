/*
 * Responsibility
 * - 1 リクエスト分の認証判定 (middleware から呼ばれる façade)
 *   - auth 無効 → 素通し
 *   - MCP endpoint かつ操作が全て public → 認証スキップ (他の route では常に認証)
 *   - それ以外 → Authorization ヘッダから credential を取り出し overlay で認証
 * - 認証設定のサマリログはインスタンスごとに 1 回だけ出す
 *
 * Notes
 * - HTTP (axum) の Request/Response には依存しない。middleware 側で RawRequest に詰め替える
 */
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::{HeaderMap, header};
use tracing::{debug, info, warn};

use crate::services::auth::custom::{CustomValidatorOverlay, RawRequest};
use crate::services::auth::types::{AuthFailure, AuthIdentity};
use crate::services::catalog::{McpOperation, PublicAccessClassifier};

/// Outcome of a successful access check.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    /// `auth.enabled = false`; nothing was checked.
    AuthDisabled,
    /// Every requested operation is public.
    Public,
    Authenticated(AuthIdentity),
}

impl AccessDecision {
    pub fn identity(&self) -> Option<&AuthIdentity> {
        match self {
            AccessDecision::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Which kind of route is being guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    /// The MCP endpoint. Public protocol operations pass without credentials.
    Mcp,
    /// Every other guarded route. The body is never consulted.
    Protected,
}

pub struct RequestAuthenticator {
    enabled: bool,
    classifier: PublicAccessClassifier,
    overlay: CustomValidatorOverlay,
    config_logged: AtomicBool,
}

impl fmt::Debug for RequestAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAuthenticator")
            .field("enabled", &self.enabled)
            .field("overlay", &self.overlay)
            .finish_non_exhaustive()
    }
}

impl RequestAuthenticator {
    pub fn new(
        enabled: bool,
        classifier: PublicAccessClassifier,
        overlay: CustomValidatorOverlay,
    ) -> Self {
        Self {
            enabled,
            classifier,
            overlay,
            config_logged: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn overlay(&self) -> &CustomValidatorOverlay {
        &self.overlay
    }

    /// Decide whether `request` may proceed.
    ///
    /// Under [`AccessScope::Mcp`] the body is read as a JSON-RPC message (or batch);
    /// anything that does not parse as one is treated as a private operation.
    pub async fn authorize(
        &self,
        request: &RawRequest,
        scope: AccessScope,
    ) -> Result<AccessDecision, AuthFailure> {
        self.log_config_once();

        if !self.enabled {
            return Ok(AccessDecision::AuthDisabled);
        }

        if scope == AccessScope::Mcp {
            if let Some(operations) = McpOperation::parse_body(&request.body) {
                if self.classifier.all_public(&operations).await {
                    debug!(operations = operations.len(), "public operation, skipping authentication");
                    return Ok(AccessDecision::Public);
                }
            }
        }

        let credential = credential_from_headers(&request.headers);
        match self.overlay.authenticate(credential, request).await {
            Ok(identity) => {
                debug!(method = %identity.method, username = ?identity.username, "request authenticated");
                Ok(AccessDecision::Authenticated(identity))
            }
            Err(failure) => {
                warn!(kind = ?failure.kind, uri = %request.uri, "request authentication failed");
                Err(failure)
            }
        }
    }

    /// Emit the configuration summary. Returns `true` only for the call that logged.
    pub fn log_config_once(&self) -> bool {
        if self.config_logged.swap(true, Ordering::AcqRel) {
            return false;
        }

        let detection = self.overlay.detection();
        if !self.enabled {
            info!("authentication disabled");
            return true;
        }

        let methods: Vec<&str> = detection.valid.iter().map(|m| m.as_str()).collect();
        info!(
            methods = ?methods,
            custom_validator = self.overlay.has_custom_validator(),
            "authentication configured"
        );
        for (method, errors) in &detection.errors {
            for error in errors {
                warn!(method = %method, error = %error, "authentication method misconfigured");
            }
        }
        if methods.is_empty() && !self.overlay.has_custom_validator() {
            warn!("no usable authentication method, every private request will be rejected");
        }
        true
    }
}

/// Strip the `Bearer` / `Basic` scheme (case-insensitive). Anything else yields `""`.
pub fn credential_from_headers(headers: &HeaderMap) -> &str {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return "";
    };

    match value.trim().split_once(' ') {
        Some((scheme, rest))
            if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("basic") =>
        {
            rest.trim()
        }
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, JwtTokenConfig};
    use crate::services::auth::custom::validator_fn;
    use crate::services::auth::engine::MultiAuthEngine;
    use crate::services::auth::token_codec::TokenCodec;
    use crate::services::auth::types::{AuthErrorKind, AuthMethod};
    use crate::services::catalog::{PromptEntry, StaticCatalog};
    use axum::body::Bytes;
    use axum::http::HeaderValue;
    use serde_json::json;
    use std::sync::Arc;

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

    fn authenticator(config: &AuthConfig) -> RequestAuthenticator {
        let catalog = StaticCatalog::new(
            Vec::new(),
            vec![
                PromptEntry {
                    name: "greeting".into(),
                    require_auth: Some(false),
                },
                PromptEntry {
                    name: "custom".into(),
                    require_auth: None,
                },
            ],
        );
        RequestAuthenticator::new(
            config.enabled,
            PublicAccessClassifier::new(Arc::new(catalog)),
            CustomValidatorOverlay::new(MultiAuthEngine::from_config(config), None),
        )
    }

    fn request(authorization: Option<&str>, body: serde_json::Value) -> RawRequest {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        RawRequest {
            headers,
            body: Bytes::from(body.to_string()),
            ..RawRequest::default()
        }
    }

    fn call(method: &str, params: serde_json::Value) -> serde_json::Value {
        json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params})
    }

    #[test]
    fn strips_known_schemes_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(credential_from_headers(&headers), "");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(credential_from_headers(&headers), "abc123");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("basic   Zm9vOmJhcg=="));
        assert_eq!(credential_from_headers(&headers), "Zm9vOmJhcg==");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Digest abc"));
        assert_eq!(credential_from_headers(&headers), "");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("abc123"));
        assert_eq!(credential_from_headers(&headers), "");
    }

    #[tokio::test]
    async fn permanent_token_is_accepted() {
        let auth = authenticator(&example_config());
        let req = request(Some("Bearer abc123"), call("tools/call", json!({})));

        let decision = auth.authorize(&req, AccessScope::Mcp).await.unwrap();

        let identity = decision.identity().unwrap();
        assert_eq!(identity.method, AuthMethod::PermanentToken);
    }

    #[tokio::test]
    async fn issued_token_is_accepted() {
        let config = example_config();
        let codec = TokenCodec::new("supersecretkey", false, config.service_name.clone());
        let token = codec.issue("alice", 3600, Default::default()).unwrap();

        let auth = authenticator(&config);
        let req = request(
            Some(&format!("Bearer {}", token)),
            call("tools/call", json!({})),
        );
        let decision = auth.authorize(&req, AccessScope::Mcp).await.unwrap();

        let identity = decision.identity().unwrap();
        assert_eq!(identity.method, AuthMethod::Jwt);
        assert_eq!(identity.username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn wrong_token_lists_attempted_methods() {
        let auth = authenticator(&example_config());
        let req = request(Some("Bearer wrong"), call("tools/call", json!({})));

        let failure = auth.authorize(&req, AccessScope::Mcp).await.unwrap_err();

        assert_eq!(failure.kind, AuthErrorKind::InvalidCredentials);
        assert!(failure.message.contains("permanent_token"));
        assert!(failure.message.contains("jwt"));
    }

    #[tokio::test]
    async fn prompt_without_flag_requires_authentication() {
        let auth = authenticator(&example_config());
        let req = request(None, call("prompts/get", json!({"name": "custom"})));

        let failure = auth.authorize(&req, AccessScope::Mcp).await.unwrap_err();

        assert_eq!(failure.kind, AuthErrorKind::MissingCredential);
    }

    #[tokio::test]
    async fn public_operations_skip_authentication() {
        let auth = authenticator(&example_config());

        let req = request(None, call("prompts/get", json!({"name": "greeting"})));
        let decision = auth.authorize(&req, AccessScope::Mcp).await.unwrap();
        assert_eq!(decision, AccessDecision::Public);

        let batch = json!([call("ping", json!({})), call("tools/list", json!({}))]);
        let decision = auth
            .authorize(&request(None, batch), AccessScope::Mcp)
            .await
            .unwrap();
        assert_eq!(decision, AccessDecision::Public);
    }

    #[tokio::test]
    async fn public_body_does_not_open_protected_routes() {
        let auth = authenticator(&example_config());
        let req = request(None, call("ping", json!({})));

        let failure = auth
            .authorize(&req, AccessScope::Protected)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, AuthErrorKind::MissingCredential);

        let req = request(Some("Bearer abc123"), call("ping", json!({})));
        let decision = auth.authorize(&req, AccessScope::Protected).await.unwrap();
        assert_eq!(
            decision.identity().unwrap().method,
            AuthMethod::PermanentToken
        );
    }

    #[tokio::test]
    async fn batch_with_one_private_call_is_private() {
        let auth = authenticator(&example_config());
        let batch = json!([call("ping", json!({})), call("tools/call", json!({}))]);

        assert!(
            auth.authorize(&request(None, batch), AccessScope::Mcp)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn non_json_rpc_body_is_private() {
        let auth = authenticator(&example_config());
        let raw = RawRequest {
            body: Bytes::from_static(b"not json"),
            ..RawRequest::default()
        };

        assert!(auth.authorize(&raw, AccessScope::Mcp).await.is_err());
    }

    #[tokio::test]
    async fn disabled_auth_lets_everything_through() {
        let config = AuthConfig {
            enabled: false,
            ..example_config()
        };
        let auth = authenticator(&config);
        let req = request(None, call("tools/call", json!({})));

        let decision = auth.authorize(&req, AccessScope::Mcp).await.unwrap();
        assert_eq!(decision, AccessDecision::AuthDisabled);
    }

    #[tokio::test]
    async fn custom_validator_is_consulted_with_the_raw_request() {
        let validator = validator_fn(|req| {
            match req.headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
                Some("k-1") => Ok(AuthIdentity::new(AuthMethod::Custom, "robot")),
                _ => Err(AuthFailure::new(AuthErrorKind::InvalidCredentials, "bad api key")),
            }
        });
        let auth = RequestAuthenticator::new(
            true,
            PublicAccessClassifier::new(Arc::new(StaticCatalog::default())),
            CustomValidatorOverlay::new(
                MultiAuthEngine::from_config(&AuthConfig::default()),
                Some(validator),
            ),
        );

        let mut raw = request(None, call("tools/call", json!({})));
        raw.headers
            .insert("x-api-key", HeaderValue::from_static("k-1"));
        let decision = auth.authorize(&raw, AccessScope::Mcp).await.unwrap();
        assert_eq!(decision.identity().unwrap().username.as_deref(), Some("robot"));
    }

    #[test]
    fn config_summary_is_logged_once() {
        let auth = authenticator(&example_config());

        assert!(auth.log_config_once());
        assert!(!auth.log_config_once());
        assert!(!auth.log_config_once());
    }
}
