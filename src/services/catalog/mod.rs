pub mod client;
pub mod public_access;
pub mod static_catalog;

pub use client::{Catalog, CatalogError, PromptEntry, ResourceEntry};
pub use public_access::{McpOperation, PublicAccessClassifier};
pub use static_catalog::StaticCatalog;
