/*
 * Responsibility
 * - GET /directory/groups/{group}/members/me[?domain=..]
 *   - 認証済みユーザーが AD/LDAP グループの直接メンバーなら 204
 *   - それ以外は 403 (グループ名入り)。ディレクトリ障害も 403 に倒す
 * - POST /admin/directory/cache/clear: DN / group の両キャッシュを破棄
 *   - 管理操作なので permanent server token のみ許可 (発行済み token / Basic は 403)
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::AuthMethod;
use crate::services::directory::{DirectoryError, GroupAuthorizer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DomainQuery {
    pub domain: Option<String>,
}

pub async fn check_membership(
    State(state): State<AppState>,
    AuthCtx(ctx): AuthCtx,
    Path(group): Path<String>,
    Query(query): Query<DomainQuery>,
) -> Result<StatusCode, AppError> {
    let authorizer = configured(&state)?;

    let Some(username) = ctx.username() else {
        tracing::debug!(method = %ctx.identity.method, "identity without username, denying group check");
        return Err(AppError::not_in_group(&group));
    };

    match authorizer
        .is_user_in_group_in(query.domain.as_deref(), username, &group)
        .await
    {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(AppError::not_in_group(&group)),
        Err(DirectoryError::UnknownDomain(domain)) => Err(AppError::bad_request(
            "UNKNOWN_DOMAIN",
            format!("unknown directory domain '{}'", domain),
        )),
        Err(err) => {
            tracing::error!(error = %err, group = %group, "group check failed");
            Err(AppError::not_in_group(&group))
        }
    }
}

pub async fn clear_cache(
    State(state): State<AppState>,
    AuthCtx(ctx): AuthCtx,
) -> Result<StatusCode, AppError> {
    if ctx.identity.method != AuthMethod::PermanentToken {
        tracing::warn!(method = %ctx.identity.method, username = ?ctx.username(), "cache clear refused");
        return Err(AppError::Forbidden(
            "a permanent server token is required".into(),
        ));
    }
    let authorizer = configured(&state)?;

    authorizer.clear_cache().await.map_err(|err| {
        tracing::error!(error = %err, "directory cache clear failed");
        AppError::Internal
    })?;

    tracing::info!("directory caches cleared");
    Ok(StatusCode::NO_CONTENT)
}

fn configured(state: &AppState) -> Result<&GroupAuthorizer, AppError> {
    state.directory.as_ref().ok_or_else(|| {
        AppError::bad_request(
            "DIRECTORY_NOT_CONFIGURED",
            "directory authorization is not configured",
        )
    })
}
