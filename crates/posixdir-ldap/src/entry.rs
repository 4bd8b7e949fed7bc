//! Directory entries: search results and pending add requests.

use posixdir_core::DistinguishedName;
use std::collections::BTreeMap;

/// LDAP entry returned by a search.
#[derive(Debug, Clone, Default)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (value order preserved from the server).
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Returns the first value of the attribute if present (name compared case-insensitively).
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns all values for the attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values.as_slice())
    }

    /// Parses the attribute as an unsigned integer.
    #[must_use]
    pub fn u32_value(&self, attribute: &str) -> Option<u32> {
        self.first(attribute).and_then(|value| value.trim().parse().ok())
    }
}

/// A fully-formed entry ready to be submitted with an `add` operation.
///
/// Object classes are kept apart from the other attributes; they are sent as the
/// `objectClass` attribute on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    dn: DistinguishedName,
    object_classes: Vec<String>,
    attributes: BTreeMap<String, Vec<String>>,
}

impl NewEntry {
    /// Creates a new add request.
    #[must_use]
    pub fn new(
        dn: DistinguishedName,
        object_classes: Vec<String>,
        attributes: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            dn,
            object_classes,
            attributes,
        }
    }

    /// Distinguished name of the new entry.
    #[must_use]
    pub const fn dn(&self) -> &DistinguishedName {
        &self.dn
    }

    /// Object classes in declaration order.
    #[must_use]
    pub fn object_classes(&self) -> &[String] {
        &self.object_classes
    }

    /// Attribute map, excluding object classes.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.attributes
    }

    /// All attributes including `objectClass`, as submitted to the directory.
    #[must_use]
    pub fn wire_attributes(&self) -> Vec<(String, Vec<String>)> {
        let mut attributes = Vec::with_capacity(self.attributes.len() + 1);
        attributes.push(("objectClass".to_string(), self.object_classes.clone()));
        attributes.extend(
            self.attributes
                .iter()
                .map(|(name, values)| (name.clone(), values.clone())),
        );
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_lookup_ignores_attribute_case() {
        let mut attributes = BTreeMap::new();
        attributes.insert("uidNumber".to_string(), vec!["5001".to_string()]);
        attributes.insert("cn".to_string(), vec!["ana".to_string()]);
        let entry = LdapEntry {
            dn: "uid=ana,ou=people,dc=example,dc=com".to_string(),
            attributes,
        };

        assert_eq!(entry.first("uidnumber"), Some("5001"));
        assert_eq!(entry.u32_value("UIDNUMBER"), Some(5001));
        assert_eq!(entry.u32_value("cn"), None);
        assert!(entry.values("mail").is_none());
    }

    #[test]
    fn wire_attributes_lead_with_object_classes() {
        let dn = DistinguishedName::parse("cn=artists,ou=groups,dc=example,dc=com").unwrap();
        let mut attributes = BTreeMap::new();
        attributes.insert("cn".to_string(), vec!["artists".to_string()]);
        attributes.insert("gidnumber".to_string(), vec!["5001".to_string()]);
        let entry = NewEntry::new(
            dn,
            vec!["top".to_string(), "posixGroup".to_string()],
            attributes,
        );

        let wire = entry.wire_attributes();
        assert_eq!(wire.len(), 3);
        assert_eq!(
            wire[0],
            (
                "objectClass".to_string(),
                vec!["top".to_string(), "posixGroup".to_string()]
            )
        );
        assert_eq!(wire[1].0, "cn");
    }
}
