//! Parser for rendered `key: value` record documents.

use posixdir_core::{DistinguishedName, Error, Result};
use posixdir_ldap::NewEntry;
use std::collections::BTreeMap;

/// A parsed record awaiting submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryRecord {
    distinguished_name: Option<String>,
    object_classes: Vec<String>,
    attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryRecord {
    /// The `dn:` value, if the document had one.
    #[must_use]
    pub fn distinguished_name(&self) -> Option<&str> {
        self.distinguished_name.as_deref()
    }

    /// Object classes in document order.
    #[must_use]
    pub fn object_classes(&self) -> &[String] {
        &self.object_classes
    }

    /// Remaining attributes keyed by lower-cased name.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.attributes
    }

    /// Values of one attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(&attribute.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Converts the record into an add request.
    ///
    /// # Errors
    ///
    /// [`Error::IncompleteRecord`] if the DN or object classes are missing,
    /// [`Error::MalformedRecord`] if the DN does not parse.
    pub fn into_new_entry(self) -> Result<NewEntry> {
        let raw_dn = self
            .distinguished_name
            .ok_or_else(|| Error::IncompleteRecord("record has no dn".to_string()))?;
        if self.object_classes.is_empty() {
            return Err(Error::IncompleteRecord(format!(
                "record `{raw_dn}` has no object classes"
            )));
        }
        let dn = DistinguishedName::parse(&raw_dn).map_err(|_| Error::MalformedRecord {
            line: format!("dn: {raw_dn}"),
        })?;
        Ok(NewEntry::new(dn, self.object_classes, self.attributes))
    }
}

/// Parses a rendered document.
///
/// # Errors
///
/// Returns [`Error::MalformedRecord`] naming the first line that is not `key: value`, or a
/// second `dn:` line.
pub fn parse(document: &str) -> Result<DirectoryRecord> {
    let mut record = DirectoryRecord::default();

    for line in document.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = split_line(line)?;
        match key.as_str() {
            "dn" => {
                if record.distinguished_name.is_some() {
                    return Err(malformed(line));
                }
                record.distinguished_name = Some(value.to_string());
            }
            "objectclass" => record.object_classes.push(value.to_string()),
            _ => record
                .attributes
                .entry(key)
                .or_default()
                .push(value.to_string()),
        }
    }

    Ok(record)
}

fn split_line(line: &str) -> Result<(String, &str)> {
    let (key, value) = line.split_once(':').ok_or_else(|| malformed(line))?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() || !key.chars().all(is_key_char) {
        return Err(malformed(line));
    }
    Ok((key.to_ascii_lowercase(), value))
}

const fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.' | ';')
}

fn malformed(line: &str) -> Error {
    Error::MalformedRecord {
        line: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_document() {
        let record = parse(
            "dn: cn=artists,ou=groups,dc=example,dc=com\n\
             objectClass: top\n\
             objectClass: posixGroup\n\
             \n\
             cn: artists\n\
             gidNumber: 5001\n",
        )
        .unwrap();

        assert_eq!(
            record.distinguished_name(),
            Some("cn=artists,ou=groups,dc=example,dc=com")
        );
        assert_eq!(record.object_classes(), ["top", "posixGroup"]);
        assert_eq!(record.values("gidNumber").unwrap(), ["5001"]);
        assert!(record.attributes().contains_key("gidnumber"));
    }

    #[test]
    fn duplicate_keys_accumulate_in_order() {
        let record = parse("dn: uid=a,dc=x\nobjectclass: top\nmail: a@x\nMAIL: b@x\n").unwrap();
        assert_eq!(record.values("mail").unwrap(), ["a@x", "b@x"]);
    }

    #[test]
    fn value_keeps_colons_after_first() {
        let record = parse("dn: cn=a,dc=x\nobjectClass: top\nlabeledURI: http://x/y\n").unwrap();
        assert_eq!(record.values("labeleduri").unwrap(), ["http://x/y"]);
    }

    #[test]
    fn line_without_colon_is_malformed() {
        let err = parse("dn: cn=a,dc=x\ngarbage\n").unwrap_err();
        assert_eq!(
            err,
            Error::MalformedRecord {
                line: "garbage".to_string()
            }
        );
    }

    #[test]
    fn empty_key_or_value_is_malformed() {
        assert!(matches!(parse(": value"), Err(Error::MalformedRecord { .. })));
        assert!(matches!(parse("cn:   "), Err(Error::MalformedRecord { .. })));
        assert!(matches!(parse("bad key: v"), Err(Error::MalformedRecord { .. })));
    }

    #[test]
    fn second_dn_is_malformed() {
        let err = parse("dn: cn=a,dc=x\ndn: cn=b,dc=x\n").unwrap_err();
        assert_eq!(
            err,
            Error::MalformedRecord {
                line: "dn: cn=b,dc=x".to_string()
            }
        );
    }

    #[test]
    fn incomplete_records_are_rejected_on_conversion() {
        let no_dn = parse("objectClass: top\ncn: a\n").unwrap();
        assert!(matches!(no_dn.into_new_entry(), Err(Error::IncompleteRecord(_))));

        let no_classes = parse("dn: cn=a,dc=x\ncn: a\n").unwrap();
        assert!(matches!(
            no_classes.into_new_entry(),
            Err(Error::IncompleteRecord(_))
        ));
    }

    #[test]
    fn unparsable_dn_is_malformed_on_conversion() {
        let record = parse("dn: not a dn\nobjectClass: top\n").unwrap();
        assert!(matches!(
            record.into_new_entry(),
            Err(Error::MalformedRecord { line }) if line == "dn: not a dn"
        ));
    }

    #[test]
    fn converts_to_new_entry() {
        let entry = parse("dn: cn=a,ou=groups,dc=x\nobjectClass: posixGroup\ncn: a\n")
            .unwrap()
            .into_new_entry()
            .unwrap();
        assert_eq!(entry.dn().get("cn"), Some("a"));
        assert_eq!(entry.object_classes(), ["posixGroup"]);
        assert_eq!(entry.attributes()["cn"], ["a"]);
    }
}
