/*
 * Responsibility
 * - GET /auth/whoami: middleware が認証した identity をそのまま返す
 * - GET /auth/diagnostics: どの認証方式が使えるか / 設定エラー (secret は含まない)
 */
use axum::{Json, extract::State};
use serde::Serialize;

use crate::api::v1::extractors::AuthCtx;
use crate::services::auth::{AuthDetectionResult, AuthIdentity};
use crate::state::AppState;

pub async fn whoami(AuthCtx(ctx): AuthCtx) -> Json<AuthIdentity> {
    Json(ctx.identity)
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub enabled: bool,
    pub custom_validator: bool,
    #[serde(flatten)]
    pub detection: AuthDetectionResult,
}

pub async fn diagnostics(
    State(state): State<AppState>,
    AuthCtx(_): AuthCtx,
) -> Json<DiagnosticsResponse> {
    let overlay = state.auth.overlay();
    Json(DiagnosticsResponse {
        enabled: state.auth.is_enabled(),
        custom_validator: overlay.has_custom_validator(),
        detection: overlay.detection().clone(),
    })
}
