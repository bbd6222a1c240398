//! Catalog interface: the MCP resources/prompts this server exposes, with their auth metadata.
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("catalog data invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub uri: String,
    // None means "not declared", which is treated as private.
    #[serde(default)]
    pub require_auth: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEntry {
    pub name: String,
    #[serde(default)]
    pub require_auth: Option<bool>,
}

/// Provided by whatever owns the tool/resource/prompt registry.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_resources(&self) -> Result<Vec<ResourceEntry>, CatalogError>;

    async fn list_prompts(&self) -> Result<Vec<PromptEntry>, CatalogError>;
}
