//! Directory client
//!
//! The resolver talks to the directory through [`DirectoryClient`], which
//! hands out short-lived [`DirectoryContext`]s rooted at one entry. The
//! production implementation, [`LdapDirectory`], opens a fresh blocking
//! ldap3 connection per context and unbinds when the context is dropped.

use dirgroup_core::config::DirectoryConfig;
use dirgroup_core::types::{Attributes, DirectoryEntry, SearchScope};
use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry, SearchResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// LDAP result code for a missing base entry.
const NO_SUCH_OBJECT: u32 = 32;

/// Filter used when the caller passes an empty one.
pub const MATCH_ALL_FILTER: &str = "(objectClass=*)";

/// Failure reported by a directory client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The named entry does not exist. Not an error to the resolver.
    #[error("no such entry: {0}")]
    NotFound(String),
    #[error("{0}")]
    Failed(String),
}

/// An open, bound view of the directory rooted at one entry.
///
/// Dropping the context releases the connection.
pub trait DirectoryContext {
    /// Search below the context root. An empty `filter` matches every entry
    /// in scope; empty `attrs` requests all attributes.
    fn search(
        &mut self,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, LookupError>;
}

/// Source of directory contexts.
pub trait DirectoryClient: Send + Sync {
    /// Name reported in errors raised on behalf of this client.
    fn provider_name(&self) -> &str;

    /// Bind a context rooted at `base`.
    fn open(&self, base: &str) -> Result<Box<dyn DirectoryContext + '_>, LookupError>;
}

impl<T: DirectoryClient + ?Sized> DirectoryClient for Arc<T> {
    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn open(&self, base: &str) -> Result<Box<dyn DirectoryContext + '_>, LookupError> {
        (**self).open(base)
    }
}

/// LDAP server information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapServerInfo {
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub naming_contexts: Vec<String>,
    pub supported_ldap_version: Vec<String>,
}

/// ldap3-backed directory client
pub struct LdapDirectory {
    config: DirectoryConfig,
}

impl LdapDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Connect and bind with the service account.
    fn connect(&self) -> Result<LdapConn, LookupError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout())
            .set_starttls(self.config.start_tls)
            .set_no_tls_verify(self.config.skip_tls_verify);

        debug!("Connecting to LDAP server: {}", self.config.server_url);

        let mut conn = LdapConn::with_settings(settings, &self.config.server_url).map_err(|e| {
            LookupError::Failed(format!("Failed to connect to LDAP server: {}", e))
        })?;

        if !self.config.bind_dn.is_empty() {
            let result = conn
                .simple_bind(&self.config.bind_dn, &self.config.bind_password)
                .map_err(|e| LookupError::Failed(format!("Service bind failed: {}", e)))?;

            if result.rc != 0 {
                return Err(LookupError::Failed(format!(
                    "Service account bind failed with code: {} {}",
                    result.rc, result.text
                )));
            }
        }

        Ok(conn)
    }

    /// Query the root DSE for server diagnostics.
    pub fn probe(&self) -> Result<LdapServerInfo, LookupError> {
        let mut context = LdapContext {
            conn: self.connect()?,
            base: String::new(),
            timeout: self.timeout(),
        };

        let entries = context.search(
            SearchScope::Base,
            MATCH_ALL_FILTER,
            &[
                "vendorName",
                "vendorVersion",
                "namingContexts",
                "supportedLDAPVersion",
            ],
        )?;

        let info = match entries.into_iter().next() {
            Some(entry) => LdapServerInfo {
                vendor: entry.attributes.first("vendorName").map(str::to_string),
                version: entry.attributes.first("vendorVersion").map(str::to_string),
                naming_contexts: entry.attributes.get("namingContexts").to_vec(),
                supported_ldap_version: entry.attributes.get("supportedLDAPVersion").to_vec(),
            },
            None => LdapServerInfo {
                vendor: None,
                version: None,
                naming_contexts: vec![],
                supported_ldap_version: vec!["3".to_string()],
            },
        };

        info!(
            "LDAP server {} reachable ({} naming contexts)",
            self.config.server_url,
            info.naming_contexts.len()
        );
        Ok(info)
    }
}

impl DirectoryClient for LdapDirectory {
    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    fn open(&self, base: &str) -> Result<Box<dyn DirectoryContext + '_>, LookupError> {
        Ok(Box::new(LdapContext {
            conn: self.connect()?,
            base: base.to_string(),
            timeout: self.timeout(),
        }))
    }
}

/// One bound connection, searched relative to `base`.
struct LdapContext {
    conn: LdapConn,
    base: String,
    timeout: Duration,
}

impl DirectoryContext for LdapContext {
    fn search(
        &mut self,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, LookupError> {
        let filter = if filter.trim().is_empty() {
            MATCH_ALL_FILTER
        } else {
            filter
        };

        debug!("Searching '{}' ({}) with filter: {}", self.base, scope, filter);

        let SearchResult(rs, result) = self
            .conn
            .with_timeout(self.timeout)
            .search(&self.base, to_ldap_scope(scope), filter, attrs.to_vec())
            .map_err(|e| LookupError::Failed(format!("Search failed: {}", e)))?;

        match result.rc {
            0 => {}
            NO_SUCH_OBJECT => return Err(LookupError::NotFound(self.base.clone())),
            rc => {
                return Err(LookupError::Failed(format!(
                    "Search error: code {} {}",
                    rc, result.text
                )))
            }
        }

        Ok(rs
            .into_iter()
            .map(|raw| {
                let entry = SearchEntry::construct(raw);
                let attributes: Attributes = entry.attrs.into_iter().collect();
                DirectoryEntry::new(entry.dn, attributes)
            })
            .collect())
    }
}

impl Drop for LdapContext {
    fn drop(&mut self) {
        if let Err(e) = self.conn.unbind() {
            debug!("Unbind from '{}' failed: {}", self.base, e);
        }
    }
}

fn to_ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}
