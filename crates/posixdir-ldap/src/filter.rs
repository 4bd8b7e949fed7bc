//! Search filter construction.
//!
//! Filters are built from equality terms and rendered to RFC 4515 text with every assertion
//! value escaped, so caller-supplied names cannot alter the filter structure.

use std::collections::BTreeMap;
use std::fmt;

/// Structured LDAP search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `(attribute=value)`
    Equal {
        /// Attribute name.
        attribute: String,
        /// Assertion value (unescaped).
        value: String,
    },
    /// `(&(...)(...))`
    And(Vec<Filter>),
}

impl Filter {
    /// Equality assertion on a single attribute.
    #[must_use]
    pub fn equal(attribute: impl Into<String>, value: impl ToString) -> Self {
        Self::Equal {
            attribute: attribute.into(),
            value: value.to_string(),
        }
    }

    /// Shorthand for `(objectClass=<class>)`.
    #[must_use]
    pub fn object_class(class: impl Into<String>) -> Self {
        Self::Equal {
            attribute: "objectClass".to_string(),
            value: class.into(),
        }
    }

    /// Conjunction of the given filters.
    #[must_use]
    pub fn and<I>(filters: I) -> Self
    where
        I: IntoIterator<Item = Filter>,
    {
        Self::And(filters.into_iter().collect())
    }

    /// Evaluates the filter against an attribute map.
    ///
    /// Attribute names and values compare case-insensitively, matching the default equality
    /// rules for the attributes used in POSIX provisioning.
    #[must_use]
    pub fn matches(&self, attributes: &BTreeMap<String, Vec<String>>) -> bool {
        match self {
            Self::Equal { attribute, value } => attributes
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case(attribute))
                .flat_map(|(_, values)| values)
                .any(|candidate| candidate.eq_ignore_ascii_case(value)),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(attributes)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal { attribute, value } => {
                write!(f, "({attribute}={})", escape_filter_value(value))
            }
            Self::And(filters) => {
                f.write_str("(&")?;
                for filter in filters {
                    write!(f, "{filter}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_conjunction() {
        let filter = Filter::and([
            Filter::object_class("posixGroup"),
            Filter::equal("gidNumber", 5001),
        ]);
        assert_eq!(filter.to_string(), "(&(objectClass=posixGroup)(gidNumber=5001))");
    }

    #[test]
    fn escapes_assertion_values() {
        let filter = Filter::equal("cn", "a*)(uid=*");
        assert_eq!(filter.to_string(), "(cn=a\\2a\\29\\28uid=\\2a)");
    }

    #[test]
    fn matches_case_insensitively() {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "objectclass".to_string(),
            vec!["top".to_string(), "posixGroup".to_string()],
        );
        attributes.insert("cn".to_string(), vec!["Artists".to_string()]);

        let filter = Filter::and([
            Filter::object_class("posixgroup"),
            Filter::equal("CN", "artists"),
        ]);
        assert!(filter.matches(&attributes));
        assert!(!Filter::equal("gidNumber", 5001).matches(&attributes));
    }
}
