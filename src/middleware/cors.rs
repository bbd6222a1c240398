//! CORS policy for browser-based MCP clients.
//!
//! Note:
//! - CORS is enforced by browsers. Server-to-server MCP clients are not restricted by it.
//! - Credentials travel in the Authorization header, never in cookies, so
//!   `allow_credentials` stays off in every mode.
//!
//! Policy:
//! - Development: permissive (Allow-Origin: *).
//! - Production: allowlist origins from `CORS_ALLOWED_ORIGINS` (exact match).

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;

// Streamable HTTP transport headers.
const MCP_SESSION_ID: &str = "mcp-session-id";
const MCP_PROTOCOL_VERSION: &str = "mcp-protocol-version";

/// Apply CORS policy to the given Router.
pub fn apply(router: Router, config: &Config) -> Router {
    router.layer(layer(config))
}

fn layer(config: &Config) -> CorsLayer {
    let cors = if config.app_env.is_production() {
        // An empty allowlist allows nothing (no CORS headers at all).
        let allowed: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
            allowed.iter().any(|v| v == origin)
        });

        CorsLayer::new().allow_origin(allow_origin)
    } else {
        CorsLayer::new().allow_origin(Any)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(MCP_SESSION_ID),
            HeaderName::from_static(MCP_PROTOCOL_VERSION),
        ])
        .expose_headers([HeaderName::from_static(MCP_SESSION_ID)])
        .max_age(std::time::Duration::from_secs(60 * 10))
}
