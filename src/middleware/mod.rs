/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: リクエスト認証 / cors: CORS / http: request-id・trace・body limit・timeout
 */
pub mod auth;
pub mod cors;
pub mod http;
