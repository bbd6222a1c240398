//! Public/private classification of MCP (JSON-RPC) operations.
//!
//! Fail closed everywhere: unknown operation, unknown item, missing target,
//! catalog error or undeclared `requireAuth` all mean "authentication required".

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::services::catalog::client::Catalog;

/// Handshake / liveness / capability listing.
const ALWAYS_PUBLIC: &[&str] = &[
    "initialize",
    "notifications/initialized",
    "ping",
    "tools/list",
    "resources/list",
    "resources/templates/list",
    "prompts/list",
];

const RESOURCES_READ: &str = "resources/read";
const PROMPTS_GET: &str = "prompts/get";

/// One JSON-RPC call as far as auth cares: method name plus the item it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpOperation {
    pub method: String,
    pub target: Option<String>,
}

impl McpOperation {
    pub fn new(method: impl Into<String>, target: Option<String>) -> Self {
        Self {
            method: method.into(),
            target,
        }
    }

    /// `resources/read` targets `params.uri`, `prompts/get` targets `params.name`.
    pub fn from_json_rpc(message: &Value) -> Option<Self> {
        let method = message.get("method")?.as_str()?.to_string();
        let params = message.get("params");
        let field = match method.as_str() {
            RESOURCES_READ => Some("uri"),
            PROMPTS_GET => Some("name"),
            _ => None,
        };
        let target = field
            .and_then(|f| params.and_then(|p| p.get(f)))
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self { method, target })
    }

    /// Parse a request body (single message or batch). `None` if it is not JSON-RPC.
    pub fn parse_body(body: &[u8]) -> Option<Vec<Self>> {
        let value: Value = serde_json::from_slice(body).ok()?;
        match value {
            Value::Array(batch) => {
                if batch.is_empty() {
                    return None;
                }
                batch.iter().map(Self::from_json_rpc).collect()
            }
            single => Self::from_json_rpc(&single).map(|op| vec![op]),
        }
    }
}

pub struct PublicAccessClassifier {
    catalog: Arc<dyn Catalog>,
}

impl fmt::Debug for PublicAccessClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicAccessClassifier").finish_non_exhaustive()
    }
}

impl PublicAccessClassifier {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    pub async fn is_public(&self, operation: &str, target: Option<&str>) -> bool {
        if ALWAYS_PUBLIC.contains(&operation) {
            return true;
        }

        match operation {
            RESOURCES_READ => {
                let Some(uri) = target else { return false };
                match self.catalog.list_resources().await {
                    Ok(resources) => resources
                        .iter()
                        .find(|r| r.uri == uri)
                        .is_some_and(|r| r.require_auth == Some(false)),
                    Err(err) => {
                        warn!(error = %err, "resource catalog lookup failed, treating as private");
                        false
                    }
                }
            }
            PROMPTS_GET => {
                let Some(name) = target else { return false };
                match self.catalog.list_prompts().await {
                    Ok(prompts) => prompts
                        .iter()
                        .find(|p| p.name == name)
                        .is_some_and(|p| p.require_auth == Some(false)),
                    Err(err) => {
                        warn!(error = %err, "prompt catalog lookup failed, treating as private");
                        false
                    }
                }
            }
            _ => false,
        }
    }

    /// A batch is public only if every call in it is.
    pub async fn all_public(&self, operations: &[McpOperation]) -> bool {
        if operations.is_empty() {
            return false;
        }
        for op in operations {
            if !self.is_public(&op.method, op.target.as_deref()).await {
                return false;
            }
        }
        true
    }
}
