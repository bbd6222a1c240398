use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

use super::RequestAuthContext;

/// Handler で RequestAuthContext を受け取るための extractor
/// middleware が request.extensions() に insert 済みである前提
/// 見つからない場合は 401 (public 操作・auth 無効・middleware 未設定)
pub struct AuthCtx(pub RequestAuthContext);

impl FromRequestParts<AppState> for AuthCtx {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestAuthContext>()
            .cloned()
            .map(AuthCtx)
            .ok_or_else(|| AppError::unauthorized("authentication required"))
    }
}

/// `Option<AuthCtx>`: 認証されていなくても handler を通す
impl OptionalFromRequestParts<AppState> for AuthCtx {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestAuthContext>()
            .cloned()
            .map(AuthCtx))
    }
}
