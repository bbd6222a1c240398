//! LDAP / Active Directory implementation of [`DirectoryClient`].
//!
//! One short-lived connection per lookup: connect, bind as the service account,
//! search, unbind. Transport failures (connect, timeout, broken connection) are
//! reported as `Unavailable` so the authorizer can try the next controller;
//! protocol-level rejections are `Query`.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, ldap_escape};
use tracing::warn;

use crate::services::directory::client::{DirectoryClient, DirectoryDomain, DirectoryError};

// "No attributes" (RFC 4511); the DN is always returned.
const NO_ATTRS: &str = "1.1";

#[derive(Debug, Clone)]
pub struct LdapDirectoryClient {
    timeout: Duration,
}

impl LdapDirectoryClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn connect(
        &self,
        controller: &str,
        domain: &DirectoryDomain,
    ) -> Result<Ldap, DirectoryError> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, controller)
            .await
            .map_err(|e| unavailable(domain, controller, e))?;

        let target = controller.to_string();
        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                warn!(controller = %target, error = %err, "ldap connection closed with error");
            }
        });

        ldap.with_timeout(self.timeout)
            .simple_bind(&domain.bind_username, &domain.bind_password)
            .await
            .map_err(|e| unavailable(domain, controller, e))?
            .success()
            .map_err(|e| DirectoryError::Query(format!("service account bind rejected: {}", e)))?;

        Ok(ldap)
    }

    async fn search_dns(
        &self,
        ldap: &mut Ldap,
        controller: &str,
        domain: &DirectoryDomain,
        filter: &str,
    ) -> Result<Vec<String>, DirectoryError> {
        let (entries, _) = ldap
            .with_timeout(self.timeout)
            .search(&domain.base_dn, Scope::Subtree, filter, vec![NO_ATTRS])
            .await
            .map_err(|e| unavailable(domain, controller, e))?
            .success()
            .map_err(|e| DirectoryError::Query(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).dn)
            .collect())
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectoryClient {
    async fn find_user_dn(
        &self,
        controller: &str,
        domain: &DirectoryDomain,
        username: &str,
    ) -> Result<Option<String>, DirectoryError> {
        let mut ldap = self.connect(controller, domain).await?;

        let filter = format!(
            "(&(objectClass=user)(sAMAccountName={}))",
            ldap_escape(username)
        );
        let result = self.search_dns(&mut ldap, controller, domain, &filter).await;
        let _ = ldap.unbind().await;

        Ok(result?.into_iter().next())
    }

    async fn is_member(
        &self,
        controller: &str,
        domain: &DirectoryDomain,
        user_dn: &str,
        group: &str,
    ) -> Result<bool, DirectoryError> {
        let mut ldap = self.connect(controller, domain).await?;

        let filter = format!(
            "(&(objectClass=group)(cn={})(member={}))",
            ldap_escape(group),
            ldap_escape(user_dn)
        );
        let result = self.search_dns(&mut ldap, controller, domain, &filter).await;
        let _ = ldap.unbind().await;

        Ok(!result?.is_empty())
    }
}

fn unavailable(domain: &DirectoryDomain, controller: &str, err: LdapError) -> DirectoryError {
    DirectoryError::Unavailable {
        domain: domain.name.clone(),
        reason: format!("{}: {}", controller, err),
    }
}
