//! POSIX account read model.

use serde::Serialize;

use crate::entry::LdapEntry;
use crate::Result;
use posixdir_core::{DistinguishedName, Error};

/// Attributes requested when listing accounts.
pub const ACCOUNT_ATTRIBUTES: &[&str] = &[
    "cn",
    "givenName",
    "sn",
    "uid",
    "uidNumber",
    "gidNumber",
    "userPassword",
    "mail",
    "homeDirectory",
    "loginShell",
];

/// A `posixAccount` entry as read back from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PosixAccount {
    /// Distinguished name of the entry.
    pub dn: DistinguishedName,
    /// Common name.
    pub cn: Option<String>,
    /// Given name.
    pub given_name: Option<String>,
    /// Surname.
    pub sn: Option<String>,
    /// Login name.
    pub uid: Option<String>,
    /// Numeric user id.
    pub uid_number: Option<u32>,
    /// Numeric primary group id.
    pub gid_number: Option<u32>,
    /// Mail addresses.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mail: Vec<String>,
    /// Home directory.
    pub home_directory: Option<String>,
    /// Login shell.
    pub login_shell: Option<String>,
    /// Scheme tag of the stored password (e.g. `{SSHA}`), never the hash itself.
    pub password_scheme: Option<String>,
}

impl PosixAccount {
    /// Builds an account from a search result entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the entry DN cannot be parsed.
    pub fn from_entry(entry: &LdapEntry) -> Result<Self> {
        let dn = DistinguishedName::parse(&entry.dn).map_err(Error::from)?;
        let owned = |attribute: &str| entry.first(attribute).map(str::to_owned);

        Ok(Self {
            dn,
            cn: owned("cn"),
            given_name: owned("givenName"),
            sn: owned("sn"),
            uid: owned("uid"),
            uid_number: entry.u32_value("uidNumber"),
            gid_number: entry.u32_value("gidNumber"),
            mail: entry.values("mail").map(<[String]>::to_vec).unwrap_or_default(),
            home_directory: owned("homeDirectory"),
            login_shell: owned("loginShell"),
            password_scheme: entry.first("userPassword").and_then(password_scheme),
        })
    }

    /// Attribute/value pairs in listing order, skipping absent attributes.
    #[must_use]
    pub fn display_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut push = |name: &'static str, value: Option<String>| {
            if let Some(value) = value {
                pairs.push((name, value));
            }
        };

        push("cn", self.cn.clone());
        push("givenName", self.given_name.clone());
        push("sn", self.sn.clone());
        push("uid", self.uid.clone());
        push("uidNumber", self.uid_number.map(|id| id.to_string()));
        push("gidNumber", self.gid_number.map(|id| id.to_string()));
        push("userPassword", self.password_scheme.clone());
        for mail in &self.mail {
            push("mail", Some(mail.clone()));
        }
        push("homeDirectory", self.home_directory.clone());
        push("loginShell", self.login_shell.clone());
        pairs
    }
}

fn password_scheme(value: &str) -> Option<String> {
    let rest = value.strip_prefix('{')?;
    let end = rest.find('}')?;
    Some(format!("{{{}}}", &rest[..end]))
}
