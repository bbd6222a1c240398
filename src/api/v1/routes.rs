/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health 以外は認証 middleware の内側
 *   - /mcp だけ public 操作判定つきの layer、他は常に認証
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware;
use crate::state::AppState;

use crate::api::v1::handlers::{
    auth::{diagnostics, whoami},
    directory::{check_membership, clear_cache},
    health::health,
    mcp::mcp,
};

pub fn routes(state: AppState) -> Router<AppState> {
    let mcp_routes = Router::new().route("/mcp", post(mcp));
    let mcp_routes = middleware::auth::access::apply_mcp(mcp_routes, state.clone());

    let guarded = Router::new()
        .route("/auth/whoami", get(whoami))
        .route("/auth/diagnostics", get(diagnostics))
        .route(
            "/directory/groups/{group}/members/me",
            get(check_membership),
        )
        .route("/admin/directory/cache/clear", post(clear_cache));
    let guarded = middleware::auth::access::apply(guarded, state);

    Router::new()
        .route("/health", get(health))
        .merge(mcp_routes)
        .merge(guarded)
}
