/*
 * Responsibility
 * - POST /mcp (JSON-RPC の入口)
 * - 操作の dispatch 自体はこの crate の範囲外。全メソッドに -32601 を返しつつ、
 *   middleware が付けた認証コンテキストが届いているかを error.data で返す
 */
use axum::{
    Json,
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::api::v1::extractors::AuthCtx;

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;

pub async fn mcp(auth: Option<AuthCtx>, body: Bytes) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            return Json(error_reply(Value::Null, PARSE_ERROR, "parse error", None)).into_response();
        }
    };

    let caller = auth.map(|AuthCtx(ctx)| {
        json!({
            "method": ctx.identity.method,
            "username": ctx.identity.username,
        })
    });

    match message {
        Value::Array(batch) if batch.is_empty() => {
            Json(error_reply(Value::Null, INVALID_REQUEST, "empty batch", None)).into_response()
        }
        Value::Array(batch) => {
            let replies: Vec<Value> = batch
                .iter()
                .filter_map(|m| reply(m, caller.as_ref()))
                .collect();
            if replies.is_empty() {
                StatusCode::ACCEPTED.into_response()
            } else {
                Json(Value::Array(replies)).into_response()
            }
        }
        single => match reply(&single, caller.as_ref()) {
            Some(r) => Json(r).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        },
    }
}

// Notifications (no `id`) get no reply.
fn reply(message: &Value, caller: Option<&Value>) -> Option<Value> {
    let id = message.get("id")?.clone();
    let Some(method) = message.get("method").and_then(Value::as_str) else {
        return Some(error_reply(id, INVALID_REQUEST, "invalid request", None));
    };

    let data = json!({
        "authenticated": caller.is_some(),
        "caller": caller,
    });
    Some(error_reply(
        id,
        METHOD_NOT_FOUND,
        &format!("method not found: {}", method),
        Some(data),
    ))
}

fn error_reply(id: Value, code: i64, message: &str, data: Option<Value>) -> Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}
