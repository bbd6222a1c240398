/*
 * Responsibility
 * - crate の公開 API (bin の mcp-auth-gateway と token-gen が使う)
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
