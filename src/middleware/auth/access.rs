//! リクエスト認証 → RequestAuthContext を extensions に入れる
//!
//! - `/mcp` だけは body を JSON-RPC として読み、public 操作なら認証をスキップする (`apply_mcp`)
//! - それ以外の guarded route は body に関係なく常に認証する (`apply`)
//! - body は一度だけバッファし、同じ bytes で request に戻すので handler 側からも読める
//! - 判定そのものは `services::auth::RequestAuthenticator` に任せる
//! - 失敗時は 401。どの方式で失敗したかは response には出さない

use std::error::Error as StdError;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{OriginalUri, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
};
use http_body_util::LengthLimitError;

use crate::api::v1::extractors::RequestAuthContext;
use crate::error::AppError;
use crate::middleware::http::MAX_BODY_BYTES;
use crate::services::auth::{AccessDecision, AccessScope, RawRequest};
use crate::state::AppState;

/// 認証が必要な route 群に middleware を適用する。public 操作の判定はしない。
///
/// 例：
/// ```ignore
/// let guarded = middleware::auth::access::apply(guarded, state.clone());
/// let v1 = Router::new().route("/health", get(health)).merge(guarded);
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, protected_middleware))
}

/// MCP endpoint 用。全操作が public なら credential なしで通す。
pub fn apply_mcp(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, mcp_middleware))
}

async fn protected_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, AccessScope::Protected, req, next).await
}

async fn mcp_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, AccessScope::Mcp, req, next).await
}

async fn authenticate(
    state: &AppState,
    scope: AccessScope,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let bytes = to_bytes(body, MAX_BODY_BYTES).await.map_err(|err| {
        if exceeds_body_limit(&err) {
            return AppError::PayloadTooLarge;
        }
        tracing::warn!(error = %err, "failed to buffer request body");
        AppError::bad_request("INVALID_BODY", "request body could not be read")
    })?;

    // nest された router では parts.uri は prefix が剥がされている
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.clone())
        .unwrap_or_else(|| parts.uri.clone());

    let raw = RawRequest {
        method: parts.method.clone(),
        uri,
        headers: parts.headers.clone(),
        body: bytes.clone(),
    };

    let decision = state.auth.authorize(&raw, scope).await?;

    if let AccessDecision::Authenticated(identity) = decision {
        // middleware → extractor への受け渡し
        parts
            .extensions
            .insert(RequestAuthContext::new(identity, &parts.headers));
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}

// Content-Length なし (chunked) の超過は読み込み中に LengthLimitError として現れる
fn exceeds_body_limit(err: &axum::Error) -> bool {
    std::iter::successors(Some(err as &(dyn StdError + 'static)), |&e| e.source())
        .any(|e| e.is::<LengthLimitError>())
}
