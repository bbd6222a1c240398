/*
 * Responsibility
 * - ディレクトリ (AD/LDAP) へ問い合わせる collaborator の trait
 * - 設定 (DirectoryDomainConfig) から実行時のドメイン情報 (DirectoryDomain) を組み立てる
 *   - baseDn 省略時は最初の controller の host から導出する
 */
use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use thiserror::Error;
use url::{Host, Url};

use crate::config::DirectoryDomainConfig;
use crate::services::cache::CacheError;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("unknown directory domain: {0}")]
    UnknownDomain(String),
    #[error("no default directory domain configured")]
    NoDefaultDomain,
    #[error("invalid directory domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },
    // Connection-level; the authorizer moves on to the next controller.
    #[error("directory unavailable for domain '{domain}': {reason}")]
    Unavailable { domain: String, reason: String },
    #[error("group check failed: {0}")]
    Query(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// A configured domain, ready to query.
#[derive(Clone)]
pub struct DirectoryDomain {
    pub name: String,
    pub controllers: Vec<String>,
    pub bind_username: String,
    pub bind_password: String,
    pub base_dn: String,
    pub default: bool,
}

impl fmt::Debug for DirectoryDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryDomain")
            .field("name", &self.name)
            .field("controllers", &self.controllers)
            .field("bind_username", &self.bind_username)
            .field("base_dn", &self.base_dn)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

impl DirectoryDomain {
    pub fn resolve(name: &str, config: &DirectoryDomainConfig) -> Result<Self, DirectoryError> {
        let invalid = |reason: String| DirectoryError::InvalidDomain {
            domain: name.to_string(),
            reason,
        };

        let controllers: Vec<String> = config
            .controllers
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(normalize_controller)
            .collect();

        let first = controllers
            .first()
            .ok_or_else(|| invalid("no controllers".to_string()))?;

        let base_dn = match config.base_dn.as_deref().map(str::trim) {
            Some(dn) if !dn.is_empty() => dn.to_string(),
            _ => derive_base_dn(first).map_err(invalid)?,
        };

        Ok(Self {
            name: name.to_string(),
            controllers,
            bind_username: config.username.clone(),
            bind_password: config.password.clone(),
            base_dn,
            default: config.default,
        })
    }
}

fn normalize_controller(raw: &str) -> String {
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("ldap://{}", raw)
    }
}

/// `ldap://dc1.corp.example.com` -> `DC=corp,DC=example,DC=com`
///
/// The first label is taken to be the controller's own host name when there are
/// three or more labels.
pub fn derive_base_dn(controller: &str) -> Result<String, String> {
    let url = Url::parse(controller).map_err(|e| format!("invalid controller url: {}", e))?;

    let ip_error = || "baseDn is required when controllers are IP addresses".to_string();

    // ldap:// is not a "special" scheme, so IPv4 hosts come back as opaque domains.
    let host = match url.host() {
        Some(Host::Domain(host)) if host.parse::<IpAddr>().is_err() => host.to_string(),
        Some(Host::Domain(_)) | Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {
            return Err(ip_error());
        }
        None => return Err("controller url has no host".to_string()),
    };

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let labels = if labels.len() > 2 {
        &labels[1..]
    } else {
        &labels[..]
    };

    if labels.is_empty() {
        return Err("controller host has no labels".to_string());
    }

    Ok(labels
        .iter()
        .map(|l| format!("DC={}", l))
        .collect::<Vec<_>>()
        .join(","))
}

/// Directory protocol collaborator. One call = one controller.
///
/// Implementations should return `DirectoryError::Unavailable` for connection
/// problems (so the caller can try the next controller) and `Query` for
/// anything the directory itself rejected.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// `Ok(None)` when the account does not exist.
    async fn find_user_dn(
        &self,
        controller: &str,
        domain: &DirectoryDomain,
        username: &str,
    ) -> Result<Option<String>, DirectoryError>;

    /// Direct membership only (no nested group expansion).
    async fn is_member(
        &self,
        controller: &str,
        domain: &DirectoryDomain,
        user_dn: &str,
        group: &str,
    ) -> Result<bool, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_config(controllers: &[&str], base_dn: Option<&str>) -> DirectoryDomainConfig {
        DirectoryDomainConfig {
            controllers: controllers.iter().map(|c| c.to_string()).collect(),
            username: "svc".into(),
            password: "hunter22".into(),
            base_dn: base_dn.map(str::to_string),
            default: false,
        }
    }

    #[test]
    fn derives_base_dn_from_controller_host() {
        assert_eq!(
            derive_base_dn("ldap://dc1.corp.example.com:389").unwrap(),
            "DC=corp,DC=example,DC=com"
        );
        assert_eq!(
            derive_base_dn("ldaps://example.com").unwrap(),
            "DC=example,DC=com"
        );
    }

    #[test]
    fn ip_controllers_need_explicit_base_dn() {
        assert!(derive_base_dn("ldap://10.0.0.5").is_err());

        let domain =
            DirectoryDomain::resolve("corp", &domain_config(&["ldap://10.0.0.5"], Some("DC=corp")))
                .unwrap();
        assert_eq!(domain.base_dn, "DC=corp");
    }

    #[test]
    fn resolve_normalizes_controllers() {
        let domain = DirectoryDomain::resolve(
            "corp",
            &domain_config(&[" dc1.corp.example.com ", "", "ldaps://dc2.corp.example.com"], None),
        )
        .unwrap();

        assert_eq!(
            domain.controllers,
            vec!["ldap://dc1.corp.example.com", "ldaps://dc2.corp.example.com"]
        );
        assert_eq!(domain.base_dn, "DC=corp,DC=example,DC=com");
    }

    #[test]
    fn resolve_without_controllers_fails() {
        let err = DirectoryDomain::resolve("corp", &domain_config(&["  "], None)).unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidDomain { .. }));
    }

    #[test]
    fn debug_hides_bind_password() {
        let domain =
            DirectoryDomain::resolve("corp", &domain_config(&["dc1.corp.example.com"], None))
                .unwrap();
        assert!(!format!("{:?}", domain).contains("hunter22"));
    }
}
