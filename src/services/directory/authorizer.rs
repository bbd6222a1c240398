//! Group-membership authorization against AD/LDAP with two cache tiers.
//!
//! - DN tier: `domain:username` -> DN or "no such user", long TTL.
//! - Group tier: `domain:username:group` -> bool, short TTL.
//!
//! Cache misses go to the directory in a spawned task: if the caller is dropped
//! mid-query, the lookup still finishes and fills the cache.
//! Cache backend failures are logged and treated as misses.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::DirectoryConfig;
use crate::services::cache::CacheClient;
use crate::services::directory::client::{DirectoryClient, DirectoryDomain, DirectoryError};

const MEMBER: &str = "1";
const NOT_MEMBER: &str = "0";

#[derive(Clone)]
pub struct GroupAuthorizer {
    domains: Arc<BTreeMap<String, DirectoryDomain>>,
    default_domain: Option<String>,
    client: Arc<dyn DirectoryClient>,
    dn_cache: Arc<dyn CacheClient>,
    group_cache: Arc<dyn CacheClient>,
    dn_ttl: Duration,
    group_ttl: Duration,
}

impl std::fmt::Debug for GroupAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupAuthorizer")
            .field("domains", &self.domains.keys().collect::<Vec<_>>())
            .field("default_domain", &self.default_domain)
            .field("dn_cache", &self.dn_cache.backend_name())
            .field("group_cache", &self.group_cache.backend_name())
            .field("dn_ttl", &self.dn_ttl)
            .field("group_ttl", &self.group_ttl)
            .finish()
    }
}

impl GroupAuthorizer {
    pub fn new(
        config: &DirectoryConfig,
        client: Arc<dyn DirectoryClient>,
        dn_cache: Arc<dyn CacheClient>,
        group_cache: Arc<dyn CacheClient>,
    ) -> Result<Self, DirectoryError> {
        let mut domains = BTreeMap::new();
        for (name, domain) in &config.domains {
            domains.insert(name.clone(), DirectoryDomain::resolve(name, domain)?);
        }

        // A lone domain is the default whether or not it is flagged.
        let default_domain = if domains.len() == 1 {
            domains.keys().next().cloned()
        } else {
            domains
                .values()
                .find(|d| d.default)
                .map(|d| d.name.clone())
        };

        Ok(Self {
            domains: Arc::new(domains),
            default_domain,
            client,
            dn_cache,
            group_cache,
            dn_ttl: config.dn_cache_ttl,
            group_ttl: config.group_cache_ttl,
        })
    }

    /// Check membership in the default domain.
    pub async fn is_user_in_group(&self, username: &str, group: &str) -> Result<bool, DirectoryError> {
        self.is_user_in_group_in(None, username, group).await
    }

    pub async fn is_user_in_group_in(
        &self,
        domain: Option<&str>,
        username: &str,
        group: &str,
    ) -> Result<bool, DirectoryError> {
        let domain = self.select_domain(domain)?.clone();
        let group_key = group_key(&domain.name, username, group);

        if let Some(hit) = self.cached(&*self.group_cache, &group_key).await {
            debug!(domain = %domain.name, username, group, "group cache hit");
            return Ok(hit == MEMBER);
        }

        let Some(user_dn) = self.resolve_dn(&domain, username).await? else {
            debug!(domain = %domain.name, username, "unknown directory user");
            self.store(&*self.group_cache, &group_key, NOT_MEMBER, self.group_ttl)
                .await;
            return Ok(false);
        };

        let this = self.clone();
        let group = group.to_string();
        detached(async move {
            let is_member = this
                .on_controllers(&domain, |controller| {
                    this.client.is_member(controller, &domain, &user_dn, &group)
                })
                .await?;

            let value = if is_member { MEMBER } else { NOT_MEMBER };
            this.store(&*this.group_cache, &group_key, value, this.group_ttl)
                .await;
            Ok(is_member)
        })
        .await
    }

    /// Evict both tiers (administrative refresh).
    pub async fn clear_cache(&self) -> Result<(), DirectoryError> {
        self.dn_cache.clear().await?;
        self.group_cache.clear().await?;
        Ok(())
    }

    pub fn domain_names(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    fn select_domain(&self, requested: Option<&str>) -> Result<&DirectoryDomain, DirectoryError> {
        match requested {
            Some(name) => self
                .domains
                .get(name)
                .ok_or_else(|| DirectoryError::UnknownDomain(name.to_string())),
            None => self
                .default_domain
                .as_ref()
                .and_then(|name| self.domains.get(name))
                .ok_or(DirectoryError::NoDefaultDomain),
        }
    }

    async fn resolve_dn(
        &self,
        domain: &DirectoryDomain,
        username: &str,
    ) -> Result<Option<String>, DirectoryError> {
        let key = dn_key(&domain.name, username);

        if let Some(hit) = self.cached(&*self.dn_cache, &key).await {
            match serde_json::from_str::<Option<String>>(&hit) {
                Ok(dn) => return Ok(dn),
                Err(err) => warn!(key = %key, error = %err, "discarding unreadable dn cache entry"),
            }
        }

        let this = self.clone();
        let domain = domain.clone();
        let username = username.to_string();
        detached(async move {
            let dn = this
                .on_controllers(&domain, |controller| {
                    this.client.find_user_dn(controller, &domain, &username)
                })
                .await?;

            // Negative results are cached too, so a missing account is not re-queried.
            match serde_json::to_string(&dn) {
                Ok(encoded) => this.store(&*this.dn_cache, &key, &encoded, this.dn_ttl).await,
                Err(err) => warn!(error = %err, "failed to encode dn cache entry"),
            }
            Ok(dn)
        })
        .await
    }

    /// Try each controller in order, at most once, until one answers.
    async fn on_controllers<'a, T, F, Fut>(
        &self,
        domain: &'a DirectoryDomain,
        op: F,
    ) -> Result<T, DirectoryError>
    where
        F: Fn(&'a str) -> Fut,
        Fut: Future<Output = Result<T, DirectoryError>>,
    {
        let mut last_reason = None;

        for controller in &domain.controllers {
            match op(controller.as_str()).await {
                Ok(value) => return Ok(value),
                Err(DirectoryError::Unavailable { reason, .. }) => {
                    warn!(domain = %domain.name, controller = %controller, reason = %reason, "directory controller unavailable, trying next");
                    last_reason = Some(reason);
                }
                Err(other) => return Err(other),
            }
        }

        Err(DirectoryError::Unavailable {
            domain: domain.name.clone(),
            reason: last_reason.unwrap_or_else(|| "no controllers configured".to_string()),
        })
    }

    async fn cached(&self, cache: &dyn CacheClient, key: &str) -> Option<String> {
        match cache.get_string(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(backend = cache.backend_name(), key, error = %err, "cache read failed");
                None
            }
        }
    }

    async fn store(&self, cache: &dyn CacheClient, key: &str, value: &str, ttl: Duration) {
        if let Err(err) = cache.set_with_ttl(key, value, ttl).await {
            warn!(backend = cache.backend_name(), key, error = %err, "cache write failed");
        }
    }
}

async fn detached<T, F>(task: F) -> Result<T, DirectoryError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, DirectoryError>> + Send + 'static,
{
    tokio::spawn(task)
        .await
        .map_err(|e| DirectoryError::Query(format!("directory lookup task failed: {}", e)))?
}

// AD account and group names are case-insensitive.
fn dn_key(domain: &str, username: &str) -> String {
    format!("{}:{}", domain, username.to_lowercase())
}

fn group_key(domain: &str, username: &str, group: &str) -> String {
    format!(
        "{}:{}:{}",
        domain,
        username.to_lowercase(),
        group.to_lowercase()
    )
}
