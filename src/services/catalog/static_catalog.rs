//! File-backed catalog (`CATALOG_PATH`), loaded once at startup.
//!
//! ```json
//! {
//!   "resources": [{ "uri": "file:///readme.md", "requireAuth": false }],
//!   "prompts":   [{ "name": "summarize" }]
//! }
//! ```
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::services::catalog::client::{Catalog, CatalogError, PromptEntry, ResourceEntry};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    resources: Vec<ResourceEntry>,
    #[serde(default)]
    prompts: Vec<PromptEntry>,
}

impl StaticCatalog {
    pub fn new(resources: Vec<ResourceEntry>, prompts: Vec<PromptEntry>) -> Self {
        Self { resources, prompts }
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(raw).map_err(|e| CatalogError::Invalid(e.to_string()))
    }

    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn list_resources(&self) -> Result<Vec<ResourceEntry>, CatalogError> {
        Ok(self.resources.clone())
    }

    async fn list_prompts(&self) -> Result<Vec<PromptEntry>, CatalogError> {
        Ok(self.prompts.clone())
    }
}
