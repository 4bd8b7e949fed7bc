//! In-memory directory used by the provisioning tests.

#![allow(dead_code)]

use async_trait::async_trait;
use posixdir_core::{Error, Result};
use posixdir_ldap::{Directory, Filter, NewEntry};
use std::collections::BTreeMap;

pub const BASE_DN: &str = "dc=example,dc=com";

type Attributes = BTreeMap<String, Vec<String>>;
type AddHook = Box<dyn FnMut(&NewEntry, &mut Vec<StoredEntry>) + Send>;
type AddFailure = Box<dyn FnMut(&NewEntry) -> Option<Error> + Send>;

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub dn: String,
    pub attributes: Attributes,
}

impl StoredEntry {
    pub fn values(&self, attribute: &str) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .flat_map(|(_, values)| values.clone())
            .collect()
    }
}

/// Directory fake that evaluates filters against stored attribute maps.
#[derive(Default)]
pub struct InMemoryDirectory {
    pub entries: Vec<StoredEntry>,
    pub added: Vec<NewEntry>,
    pub queries: usize,
    after_add: Option<AddHook>,
    fail_add: Option<AddFailure>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, name: &str, gid: u32) -> Self {
        self.entries.push(group_entry(name, gid));
        self
    }

    pub fn with_account(mut self, name: &str, uid: u32) -> Self {
        self.entries.push(account_entry(name, uid));
        self
    }

    /// Runs `hook` after every successful add, e.g. to simulate a concurrent client.
    pub fn after_add(
        mut self,
        hook: impl FnMut(&NewEntry, &mut Vec<StoredEntry>) + Send + 'static,
    ) -> Self {
        self.after_add = Some(Box::new(hook));
        self
    }

    /// Makes `add` fail whenever `failure` returns an error.
    pub fn fail_add(
        mut self,
        failure: impl FnMut(&NewEntry) -> Option<Error> + Send + 'static,
    ) -> Self {
        self.fail_add = Some(Box::new(failure));
        self
    }

    pub fn find(&self, dn: &str) -> Option<&StoredEntry> {
        self.entries
            .iter()
            .find(|entry| entry.dn.eq_ignore_ascii_case(dn))
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn exists(
        &mut self,
        search_base: &str,
        filter: &Filter,
        _attributes: &[&'static str],
        _page_size: u32,
    ) -> Result<bool> {
        self.queries += 1;
        let suffix = search_base.to_ascii_lowercase();
        Ok(self.entries.iter().any(|entry| {
            entry.dn.to_ascii_lowercase().ends_with(&suffix) && filter.matches(&entry.attributes)
        }))
    }

    async fn add(&mut self, entry: &NewEntry) -> Result<()> {
        if let Some(failure) = self.fail_add.as_mut() {
            if let Some(err) = failure(entry) {
                return Err(err);
            }
        }
        let dn = entry.dn().to_string();
        if self.find(&dn).is_some() {
            return Err(Error::ExistsConflict(dn));
        }

        let attributes = entry.wire_attributes().into_iter().collect();
        self.entries.push(StoredEntry { dn, attributes });
        self.added.push(entry.clone());

        if let Some(hook) = self.after_add.as_mut() {
            hook(entry, &mut self.entries);
        }
        Ok(())
    }
}

pub fn group_entry(name: &str, gid: u32) -> StoredEntry {
    let mut attributes = Attributes::new();
    attributes.insert(
        "objectClass".to_string(),
        vec!["top".to_string(), "posixGroup".to_string()],
    );
    attributes.insert("cn".to_string(), vec![name.to_string()]);
    attributes.insert("gidNumber".to_string(), vec![gid.to_string()]);
    StoredEntry {
        dn: format!("cn={name},ou=groups,{BASE_DN}"),
        attributes,
    }
}

pub fn account_entry(name: &str, uid: u32) -> StoredEntry {
    let mut attributes = Attributes::new();
    attributes.insert(
        "objectClass".to_string(),
        vec!["top".to_string(), "posixAccount".to_string()],
    );
    attributes.insert("cn".to_string(), vec![name.to_string()]);
    attributes.insert("uid".to_string(), vec![name.to_string()]);
    attributes.insert("uidNumber".to_string(), vec![uid.to_string()]);
    attributes.insert("gidNumber".to_string(), vec![uid.to_string()]);
    StoredEntry {
        dn: format!("uid={name},ou=people,{BASE_DN}"),
        attributes,
    }
}
