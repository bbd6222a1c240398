pub mod auth;
pub mod directory;
pub mod health;
pub mod mcp;
