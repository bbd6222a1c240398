/*
 * Responsibility
 * - GET /health (疎通用, 認証 middleware の外)
 */
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "auth_enabled": state.auth.is_enabled(),
            "directory": state.directory.is_some(),
        })),
    )
}
