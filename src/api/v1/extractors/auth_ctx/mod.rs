/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - 認証済みリクエストのコンテキスト（RequestAuthContext）を handler に提供する
 * - HTTP / axum 依存は core に閉じ込め、型定義は types に分離する
 *
 * Public API:
 * - RequestAuthContext
 * - AuthCtx
 */

mod core;
mod types;

pub use core::AuthCtx;
pub use types::RequestAuthContext;
