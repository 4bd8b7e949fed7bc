//! LDAP directory client implementation.

use crate::{
    account::{PosixAccount, ACCOUNT_ATTRIBUTES},
    config::LdapConfig,
    entry::{LdapEntry, NewEntry},
    filter::Filter,
    Result,
};
use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults};
use ldap3::{LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchResult};
use native_tls::{Certificate, TlsConnector};
use posixdir_core::Error;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_ALREADY_EXISTS: u32 = 68;

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Entries on this page.
    pub entries: Vec<LdapEntry>,
    /// Paging cookie; empty when this is the last page.
    pub cookie: Vec<u8>,
}

/// Query and submission operations the provisioning engine needs from a directory.
///
/// Implementations hold one bound session. Methods take `&mut self`, so a session serves a
/// single caller at a time; check-then-act sequences built on top of it are not isolated from
/// other clients of the same directory.
#[async_trait]
pub trait Directory: Send {
    /// Returns true if at least one entry under `search_base` matches `filter`.
    ///
    /// Only the first page of `page_size` entries is requested. `attributes` keeps the query
    /// minimal and has no effect on the answer.
    async fn exists(
        &mut self,
        search_base: &str,
        filter: &Filter,
        attributes: &[&'static str],
        page_size: u32,
    ) -> Result<bool>;

    /// Submits a new entry.
    ///
    /// # Errors
    ///
    /// [`Error::ExistsConflict`] when the directory reports the entry already exists,
    /// [`Error::DirectoryRejected`] for any other refusal.
    async fn add(&mut self, entry: &NewEntry) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapSession: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;
    async fn search_page(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&'static str],
        page_size: u32,
        cookie: Vec<u8>,
    ) -> Result<SearchPage>;
    async fn add(&mut self, dn: &str, attributes: Vec<(String, Vec<String>)>) -> Result<()>;
    async fn unbind(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LdapSession>>;
}

/// Directory client with pluggable LDAP backend.
pub struct DirectoryClient {
    config: Arc<LdapConfig>,
    connector: Box<dyn LdapConnector>,
}

impl DirectoryClient {
    /// Creates a directory client that uses the real LDAP connector.
    #[must_use]
    pub fn new(config: LdapConfig) -> Self {
        let config = Arc::new(config);
        let connector: Box<dyn LdapConnector> = Box::new(RealLdapConnector::new(config.clone()));
        Self { config, connector }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_connector(config: LdapConfig, connector: Box<dyn LdapConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    /// Opens a connection and binds with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the directory is unreachable or rejects the bind,
    /// [`Error::Config`] if the TLS material cannot be loaded.
    pub async fn connect(&self) -> Result<DirectorySession> {
        let mut session = self.connector.connect().await?;
        let credentials = self.config.credentials();
        debug!(url = self.config.url(), bind_dn = credentials.bind_dn(), "binding to directory");
        session
            .simple_bind(credentials.bind_dn(), credentials.bind_password())
            .await?;
        Ok(DirectorySession { inner: session })
    }
}

/// A bound directory session.
pub struct DirectorySession {
    inner: Box<dyn LdapSession>,
}

impl DirectorySession {
    /// Lists every `posixAccount` entry below `search_base`, following paging cookies.
    ///
    /// # Errors
    ///
    /// Propagates search failures and unparsable entry DNs.
    pub async fn list_accounts(
        &mut self,
        search_base: &str,
        page_size: u32,
    ) -> Result<Vec<PosixAccount>> {
        let filter = Filter::object_class("posixAccount").to_string();
        let mut accounts = Vec::new();
        let mut cookie = Vec::new();

        loop {
            let page = self
                .inner
                .search_page(
                    search_base,
                    &filter,
                    ACCOUNT_ATTRIBUTES,
                    page_size.max(1),
                    cookie,
                )
                .await?;
            for entry in &page.entries {
                accounts.push(PosixAccount::from_entry(entry)?);
            }
            if page.cookie.is_empty() {
                break;
            }
            cookie = page.cookie;
        }

        debug!(count = accounts.len(), search_base, "listed accounts");
        Ok(accounts)
    }

    /// Closes the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the unbind request cannot be sent.
    pub async fn unbind(mut self) -> Result<()> {
        self.inner.unbind().await
    }
}

#[async_trait]
impl Directory for DirectorySession {
    async fn exists(
        &mut self,
        search_base: &str,
        filter: &Filter,
        attributes: &[&'static str],
        page_size: u32,
    ) -> Result<bool> {
        let rendered = filter.to_string();
        let page = self
            .inner
            .search_page(
                search_base,
                &rendered,
                attributes,
                page_size.max(1),
                Vec::new(),
            )
            .await?;
        let found = !page.entries.is_empty();
        debug!(search_base, filter = %rendered, found, "existence check");
        Ok(found)
    }

    async fn add(&mut self, entry: &NewEntry) -> Result<()> {
        debug!(dn = %entry.dn(), "adding entry");
        self.inner
            .add(entry.dn().as_str(), entry.wire_attributes())
            .await
    }
}

/// Real LDAP connector backed by `ldap3`.
struct RealLdapConnector {
    config: Arc<LdapConfig>,
}

impl RealLdapConnector {
    fn new(config: Arc<LdapConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        let settings = build_ldap_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, self.config.url())
            .await
            .map_err(|err| {
                Error::Connection(format!("cannot reach {}: {err}", self.config.url()))
            })?;
        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                warn!(error = %err, "LDAP connection driver error");
            }
        });
        Ok(Box::new(RealLdapSession {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct RealLdapSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = timeout(self.operation_timeout, self.inner.simple_bind(dn, password))
            .await
            .map_err(|_| Error::Timeout("bind timed out".to_string()))?
            .map_err(map_ldap_error)?;
        if result.rc != RC_SUCCESS {
            return Err(Error::Connection(format!(
                "bind as `{dn}` failed (rc={}): {}",
                result.rc, result.text
            )));
        }
        Ok(())
    }

    async fn search_page(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&'static str],
        page_size: u32,
        cookie: Vec<u8>,
    ) -> Result<SearchPage> {
        let paging = PagedResults {
            size: i32::try_from(page_size).unwrap_or(i32::MAX),
            cookie,
        };
        let SearchResult(raw_entries, result) = timeout(
            self.operation_timeout,
            self.inner
                .with_controls(paging)
                .search(base_dn, Scope::Subtree, filter, attributes.to_vec()),
        )
        .await
        .map_err(|_| Error::Timeout("search timed out".to_string()))?
        .map_err(map_ldap_error)?;

        match result.rc {
            RC_SUCCESS => {}
            RC_NO_SUCH_OBJECT => return Ok(SearchPage::default()),
            code => {
                return Err(Error::DirectoryRejected {
                    code,
                    message: result.text,
                })
            }
        }

        let cookie = result
            .ctrls
            .iter()
            .find_map(|ctrl| match ctrl {
                Control(Some(ControlType::PagedResults), raw) => {
                    Some(raw.parse::<PagedResults>().cookie)
                }
                _ => None,
            })
            .unwrap_or_default();

        let entries = raw_entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| LdapEntry {
                dn: entry.dn,
                attributes: entry.attrs.into_iter().collect::<BTreeMap<_, _>>(),
            })
            .collect();

        Ok(SearchPage { entries, cookie })
    }

    async fn add(&mut self, dn: &str, attributes: Vec<(String, Vec<String>)>) -> Result<()> {
        let attrs = attributes
            .iter()
            .map(|(name, values)| {
                (
                    name.as_str(),
                    values.iter().map(String::as_str).collect::<HashSet<_>>(),
                )
            })
            .collect::<Vec<_>>();

        let result = timeout(self.operation_timeout, self.inner.add(dn, attrs))
            .await
            .map_err(|_| Error::Timeout("add timed out".to_string()))?
            .map_err(map_ldap_error)?;

        match result.rc {
            RC_SUCCESS => Ok(()),
            RC_ALREADY_EXISTS => Err(Error::ExistsConflict(dn.to_string())),
            code => Err(Error::DirectoryRejected {
                code,
                message: result.text,
            }),
        }
    }

    async fn unbind(&mut self) -> Result<()> {
        timeout(self.operation_timeout, self.inner.unbind())
            .await
            .map_err(|_| Error::Timeout("unbind timed out".to_string()))?
            .map_err(map_ldap_error)?;
        Ok(())
    }
}

fn build_ldap_settings(config: &LdapConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new()
        .set_conn_timeout(config.connection_timeout())
        .set_starttls(config.start_tls());

    if let Some(cert_path) = config.tls_ca_cert() {
        debug!("loading directory CA certificate from {}", cert_path.display());
        let pem = fs::read(cert_path).map_err(|err| {
            Error::Config(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::Config(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::Config(format!("failed to load CA certificate: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: ldap3::LdapError) -> Error {
    Error::Connection(err.to_string())
}
