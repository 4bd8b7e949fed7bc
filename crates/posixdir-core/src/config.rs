//! Provisioning configuration.
//!
//! Configuration is assembled from one or more YAML documents ("layers"). Later layers override
//! earlier ones key by key, and the merged document is validated before any directory contact.

use crate::dn::DistinguishedName;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;
use validator::Validate;

/// Default lower bound for allocated identifiers.
pub const DEFAULT_ID_RANGE_LOW: u32 = 5000;
/// Default upper bound for allocated identifiers.
pub const DEFAULT_ID_RANGE_HIGH: u32 = 50000;
/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Inclusive range of numeric identifiers available for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdRange {
    low: u32,
    high: u32,
}

impl IdRange {
    /// Creates a new inclusive range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `low` is greater than `high`.
    pub fn new(low: u32, high: u32) -> Result<Self> {
        if low > high {
            return Err(Error::Config(format!(
                "identifier range is empty: {low} > {high}"
            )));
        }
        Ok(Self { low, high })
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn low(&self) -> u32 {
        self.low
    }

    /// Inclusive upper bound.
    #[must_use]
    pub const fn high(&self) -> u32 {
        self.high
    }

    /// Returns true if `id` lies within the range.
    #[must_use]
    pub const fn contains(&self, id: u32) -> bool {
        id >= self.low && id <= self.high
    }

    /// Number of identifiers in the range.
    #[must_use]
    pub const fn size(&self) -> u64 {
        (self.high - self.low) as u64 + 1
    }
}

impl Default for IdRange {
    fn default() -> Self {
        Self {
            low: DEFAULT_ID_RANGE_LOW,
            high: DEFAULT_ID_RANGE_HIGH,
        }
    }
}

/// One YAML configuration document and where it came from.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    /// Human-readable origin used in error messages (usually a file path).
    pub source: String,
    /// Raw YAML text.
    pub content: String,
}

impl ConfigLayer {
    /// Creates a new configuration layer.
    #[must_use]
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }

    /// Reads a layer from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded configuration file");
        Ok(Self::new(path.display().to_string(), content))
    }

    /// Returns true if this layer sets `key` at the top level.
    ///
    /// Content that is not a YAML mapping defines nothing; [`ProvisionConfig::from_layers`]
    /// reports it.
    #[must_use]
    pub fn defines(&self, key: &str) -> bool {
        match serde_yaml::from_str::<Value>(&self.content) {
            Ok(Value::Mapping(mapping)) => mapping.contains_key(key),
            _ => false,
        }
    }
}

/// Configuration for provisioning POSIX identities into a directory.
#[derive(Debug, Deserialize, Validate)]
pub struct ProvisionConfig {
    /// Directory URI (`ldap://` or `ldaps://`)
    #[validate(url)]
    pub ldap_uri: String,

    /// DN used to bind to the directory
    #[validate(length(min = 1))]
    pub ldap_bind_dn: String,

    /// Bind password
    #[serde(deserialize_with = "deserialize_secret")]
    pub ldap_bind_pw: SecretString,

    /// Whether to upgrade the connection with StartTLS before binding
    #[serde(default)]
    pub ldap_start_tls: bool,

    /// CA certificate (PEM) used to verify the directory server
    #[serde(default)]
    pub ldap_ca_cert_file: Option<PathBuf>,

    /// Domain root DN, e.g. `dc=example,dc=com`
    #[validate(length(min = 1))]
    pub ldap_root_dn: String,

    /// Domain root in DNS form; derived from `ldap_root_dn` when absent
    #[serde(default)]
    pub ldap_root_dns: Option<String>,

    /// Lowest identifier handed out
    #[serde(default = "default_id_range_low")]
    pub id_range_low: u32,

    /// Highest identifier handed out
    #[serde(default = "default_id_range_high")]
    pub id_range_high: u32,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-operation timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

const fn default_id_range_low() -> u32 {
    DEFAULT_ID_RANGE_LOW
}

const fn default_id_range_high() -> u32 {
    DEFAULT_ID_RANGE_HIGH
}

const fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

const fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl ProvisionConfig {
    /// Merges the given layers in order and validates the result.
    ///
    /// Empty documents are skipped. Every non-empty document must be a YAML mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a layer cannot be parsed, a required key is missing, or the
    /// merged configuration fails validation.
    pub fn from_layers(layers: &[ConfigLayer]) -> Result<Self> {
        let mut merged = Mapping::new();
        for layer in layers {
            let value: Value = serde_yaml::from_str(&layer.content)
                .map_err(|err| Error::Config(format!("{}: {err}", layer.source)))?;
            match value {
                Value::Null => continue,
                Value::Mapping(mapping) => {
                    debug!(
                        source = %layer.source,
                        keys = mapping.len(),
                        "merging configuration layer"
                    );
                    for (key, value) in mapping {
                        merged.insert(key, value);
                    }
                }
                _ => {
                    return Err(Error::Config(format!(
                        "{}: configuration must be a mapping",
                        layer.source
                    )))
                }
            }
        }

        let config: Self = serde_yaml::from_value(Value::Mapping(merged))?;
        config.validated()
    }

    /// Validates the configuration and fills in derived values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validated(mut self) -> Result<Self> {
        self.validate()?;

        let url = Url::parse(&self.ldap_uri)?;
        if !matches!(url.scheme(), "ldap" | "ldaps") {
            return Err(Error::Config(format!(
                "unsupported directory URI scheme `{}`",
                url.scheme()
            )));
        }

        if self.ldap_bind_pw.expose_secret().is_empty() {
            return Err(Error::Config("ldap_bind_pw must not be empty".to_string()));
        }

        if self.ldap_start_tls && self.ldap_ca_cert_file.is_none() {
            return Err(Error::Config(
                "ldap_start_tls requires ldap_ca_cert_file".to_string(),
            ));
        }

        IdRange::new(self.id_range_low, self.id_range_high)?;

        let root_dn = self.root_dn()?;
        if self.ldap_root_dns.is_none() {
            let dns = root_dn
                .to_dns_domain()
                .map_err(|err| Error::Config(format!("cannot derive ldap_root_dns: {err}")))?;
            self.ldap_root_dns = Some(dns);
        }

        Ok(self)
    }

    /// Returns the parsed domain root DN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `ldap_root_dn` is not a valid distinguished name.
    pub fn root_dn(&self) -> Result<DistinguishedName> {
        DistinguishedName::parse(&self.ldap_root_dn)
            .map_err(|err| Error::Config(format!("invalid ldap_root_dn: {err}")))
    }

    /// Returns the domain root in DNS form (`example.com`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the value is absent and cannot be derived.
    pub fn root_dns(&self) -> Result<String> {
        if let Some(dns) = &self.ldap_root_dns {
            return Ok(dns.clone());
        }
        self.root_dn()?
            .to_dns_domain()
            .map_err(|err| Error::Config(format!("cannot derive ldap_root_dns: {err}")))
    }

    /// Returns the configured identifier range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the bounds are inverted.
    pub fn id_range(&self) -> Result<IdRange> {
        IdRange::new(self.id_range_low, self.id_range_high)
    }

    /// Connection timeout as a [`Duration`].
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Operation timeout as a [`Duration`].
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}
