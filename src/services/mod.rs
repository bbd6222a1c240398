/*
 * Responsibility
 * - ドメインロジック (HTTP に依存しない)
 *   - auth: 認証 (credential 検証 / multi-auth / custom validator / public 判定)
 *   - directory: AD/LDAP グループ所属による認可
 *   - catalog, cache: 上記が使う collaborator
 */
pub mod auth;
pub mod cache;
pub mod catalog;
pub mod directory;
