//! Compiled-in record templates.
//!
//! Templates are line-oriented `key: value` documents with `{{placeholder}}` markers. Rendering
//! is a single left-to-right pass, so substituted values are never expanded again. Values are
//! not validated; a value containing a newline yields extra lines in the document, which the
//! parser then judges on their own.

use crate::password::EncodedPassword;
use posixdir_core::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const GROUP_TEMPLATE: &str = "\
dn: cn={{group_name}},ou=groups,{{domain_dn}}
objectClass: top
objectClass: posixGroup
cn: {{group_name}}
gidNumber: {{gid_number}}
";

const USER_TEMPLATE: &str = "\
dn: uid={{user_name}},ou=people,{{domain_dn}}
objectClass: top
objectClass: person
objectClass: organizationalPerson
objectClass: inetOrgPerson
objectClass: posixAccount
objectClass: shadowAccount
uid: {{user_name}}
cn: {{user_name}}
givenName: {{given_name}}
sn: {{family_name}}
displayName: {{given_name}} {{family_name}}
mail: {{user_name}}@{{domain_dns}}
uidNumber: {{uid_number}}
gidNumber: {{gid_number}}
homeDirectory: /home/{{user_name}}
loginShell: /bin/bash
userPassword: {{user_password}}
";

/// Named record template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTemplate {
    /// `posixGroup` entry under `ou=groups`.
    Group,
    /// `posixAccount` entry under `ou=people`.
    User,
}

impl RecordTemplate {
    /// Template name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::User => "user",
        }
    }

    const fn body(self) -> &'static str {
        match self {
            Self::Group => GROUP_TEMPLATE,
            Self::User => USER_TEMPLATE,
        }
    }
}

impl FromStr for RecordTemplate {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "group" => Ok(Self::Group),
            "user" => Ok(Self::User),
            other => Err(Error::InvalidRequest(format!("unknown template `{other}`"))),
        }
    }
}

impl fmt::Display for RecordTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Placeholder values for one rendering.
pub type Placeholders = BTreeMap<&'static str, String>;

/// Substitutes `values` into the template body.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if the body references a placeholder without a value.
pub fn render(template: RecordTemplate, values: &Placeholders) -> Result<String> {
    let body = template.body();
    let mut rendered = String::with_capacity(body.len() + 64);
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            Error::InvalidRequest(format!("unterminated placeholder in `{template}` template"))
        })?;
        let key = after[..end].trim();
        let value = values.get(key).ok_or_else(|| {
            Error::InvalidRequest(format!("missing value for `{key}` in `{template}` template"))
        })?;
        rendered.push_str(value);
        rest = &after[end + 2..];
    }
    rendered.push_str(rest);

    Ok(rendered)
}

/// Inputs for the group template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParams {
    /// Root DN of the domain.
    pub domain_dn: String,
    /// Group common name.
    pub group_name: String,
    /// Numeric group id.
    pub gid_number: u32,
}

impl GroupParams {
    /// Placeholder map for [`RecordTemplate::Group`].
    #[must_use]
    pub fn placeholders(&self) -> Placeholders {
        let mut values = Placeholders::new();
        values.insert("domain_dn", self.domain_dn.clone());
        values.insert("group_name", self.group_name.clone());
        values.insert("gid_number", self.gid_number.to_string());
        values
    }

    /// Renders the group document.
    ///
    /// # Errors
    ///
    /// See [`render`].
    pub fn render(&self) -> Result<String> {
        render(RecordTemplate::Group, &self.placeholders())
    }
}

/// Inputs for the user template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserParams {
    /// Root DN of the domain.
    pub domain_dn: String,
    /// DNS form of the domain, used for the mail address.
    pub domain_dns: String,
    /// Login name.
    pub user_name: String,
    /// Encoded password.
    pub user_password: EncodedPassword,
    /// Given name.
    pub given_name: String,
    /// Family name.
    pub family_name: String,
    /// Numeric user id.
    pub uid_number: u32,
    /// Numeric primary group id.
    pub gid_number: u32,
}

impl UserParams {
    /// Placeholder map for [`RecordTemplate::User`].
    #[must_use]
    pub fn placeholders(&self) -> Placeholders {
        let mut values = Placeholders::new();
        values.insert("domain_dn", self.domain_dn.clone());
        values.insert("domain_dns", self.domain_dns.clone());
        values.insert("user_name", self.user_name.clone());
        values.insert("user_password", self.user_password.as_str().to_string());
        values.insert("given_name", self.given_name.clone());
        values.insert("family_name", self.family_name.clone());
        values.insert("uid_number", self.uid_number.to_string());
        values.insert("gid_number", self.gid_number.to_string());
        values
    }

    /// Renders the user document.
    ///
    /// # Errors
    ///
    /// See [`render`].
    pub fn render(&self) -> Result<String> {
        render(RecordTemplate::User, &self.placeholders())
    }
}
