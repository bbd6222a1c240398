/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が認証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - credential の検証ロジックは services::auth 側の責務
 * - public 操作 / auth 無効のリクエストには格納されない
 */
use std::collections::BTreeMap;

use axum::http::{HeaderMap, header};
use serde::Serialize;

use crate::services::auth::AuthIdentity;

/// 認証済みのリクエストに付与されるコンテキスト (1 リクエスト限り)
///
/// - `identity` は勝った認証方式の結果 (custom validator の上書き込み)
/// - `headers` は小文字化したヘッダ名 → 値。Authorization は含めない
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuthContext {
    pub identity: AuthIdentity,
    #[serde(skip)]
    pub headers: BTreeMap<String, String>,
}

impl RequestAuthContext {
    pub fn new(identity: AuthIdentity, headers: &HeaderMap) -> Self {
        Self {
            identity,
            headers: normalize_headers(headers),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.identity.username.as_deref()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

// Repeated headers are joined with ", ". Non-UTF-8 values are dropped.
fn normalize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut normalized: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        if name == header::AUTHORIZATION {
            continue;
        }
        let Ok(value) = value.to_str() else {
            continue;
        };
        normalized
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    normalized
}
