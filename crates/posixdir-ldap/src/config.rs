//! Connection settings for the directory client.

use crate::Result;
use posixdir_core::config::{DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_OPERATION_TIMEOUT_SECS};
use posixdir_core::ProvisionConfig;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Credentials used for the administrative bind.
pub struct BindCredentials {
    bind_dn: String,
    bind_password: SecretString,
}

impl BindCredentials {
    /// Creates new bind credentials.
    #[must_use]
    pub fn new(bind_dn: impl Into<String>, bind_password: SecretString) -> Self {
        Self {
            bind_dn: bind_dn.into(),
            bind_password,
        }
    }

    /// Bind DN.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// Bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        self.bind_password.expose_secret()
    }
}

impl fmt::Debug for BindCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindCredentials")
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for connecting to the directory.
#[derive(Debug)]
pub struct LdapConfig {
    url: String,
    credentials: BindCredentials,
    start_tls: bool,
    tls_ca_cert: Option<PathBuf>,
    connection_timeout_secs: u64,
    operation_timeout_secs: u64,
}

impl LdapConfig {
    /// Creates a new directory configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided URL is invalid.
    pub fn new(url: impl Into<String>, credentials: BindCredentials) -> Result<Self> {
        let url_string = url.into();
        Url::parse(&url_string)?;

        Ok(Self {
            url: url_string,
            credentials,
            start_tls: false,
            tls_ca_cert: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        })
    }

    /// Builds the connection settings from a validated provisioning configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory URI is invalid.
    pub fn from_provision(config: &ProvisionConfig) -> Result<Self> {
        let credentials = BindCredentials::new(
            config.ldap_bind_dn.clone(),
            SecretString::from(config.ldap_bind_pw.expose_secret().to_owned()),
        );
        let mut ldap = Self::new(config.ldap_uri.clone(), credentials)?
            .with_start_tls(config.ldap_start_tls)
            .with_connection_timeout_secs(config.connection_timeout_secs)
            .with_operation_timeout_secs(config.operation_timeout_secs);
        if let Some(path) = &config.ldap_ca_cert_file {
            ldap = ldap.with_tls_ca_cert(path.clone());
        }
        Ok(ldap)
    }

    /// Returns the directory URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the bind credentials.
    #[must_use]
    pub const fn credentials(&self) -> &BindCredentials {
        &self.credentials
    }

    /// Returns whether StartTLS is negotiated before binding.
    #[must_use]
    pub const fn start_tls(&self) -> bool {
        self.start_tls
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&Path> {
        self.tls_ca_cert.as_deref()
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Enables or disables StartTLS.
    #[must_use]
    pub const fn with_start_tls(mut self, start_tls: bool) -> Self {
        self.start_tls = start_tls;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posixdir_core::config::ConfigLayer;

    fn credentials() -> BindCredentials {
        BindCredentials::new("cn=admin,dc=example,dc=com", SecretString::from("secret".to_string()))
    }

    #[test]
    fn builder_overrides() {
        let config = LdapConfig::new("ldap://ldap.example.com", credentials())
            .unwrap()
            .with_start_tls(true)
            .with_tls_ca_cert(PathBuf::from("/etc/ssl/ldap-ca.pem"))
            .with_connection_timeout_secs(20)
            .with_operation_timeout_secs(30);

        assert!(config.start_tls());
        assert_eq!(config.tls_ca_cert(), Some(Path::new("/etc/ssl/ldap-ca.pem")));
        assert_eq!(config.connection_timeout(), Duration::from_secs(20));
        assert_eq!(config.operation_timeout(), Duration::from_secs(30));
        assert_eq!(config.credentials().bind_password(), "secret");
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(LdapConfig::new("not a url", credentials()).is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", credentials());
        assert!(rendered.contains("cn=admin"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn from_provision_copies_connection_settings() {
        let provision = ProvisionConfig::from_layers(&[ConfigLayer::new(
            "test",
            "ldap_uri: ldaps://ldap.example.com\n\
             ldap_bind_dn: cn=admin,dc=example,dc=com\n\
             ldap_bind_pw: hunter2\n\
             ldap_root_dn: dc=example,dc=com\n\
             ldap_start_tls: true\n\
             ldap_ca_cert_file: /tmp/ca.pem\n\
             operation_timeout_secs: 5\n",
        )])
        .unwrap();

        let config = LdapConfig::from_provision(&provision).unwrap();
        assert_eq!(config.url(), "ldaps://ldap.example.com");
        assert!(config.start_tls());
        assert_eq!(config.tls_ca_cert(), Some(Path::new("/tmp/ca.pem")));
        assert_eq!(config.operation_timeout(), Duration::from_secs(5));
        assert_eq!(config.credentials().bind_dn(), "cn=admin,dc=example,dc=com");
        assert_eq!(config.credentials().bind_password(), "hunter2");
    }
}
