/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - auth: リクエスト認証 façade / directory: グループ認可 (未設定なら None)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::services::{auth::RequestAuthenticator, directory::GroupAuthorizer};

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<RequestAuthenticator>,
    pub directory: Option<GroupAuthorizer>,
}

impl AppState {
    pub fn new(auth: Arc<RequestAuthenticator>, directory: Option<GroupAuthorizer>) -> Self {
        Self { auth, directory }
    }
}
