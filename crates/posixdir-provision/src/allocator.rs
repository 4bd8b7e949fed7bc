//! Random identifier allocation over directory namespaces.

use posixdir_core::{Error, IdRange, Result};
use posixdir_ldap::{Directory, Filter};
use rand::Rng;
use std::fmt;
use tracing::{debug, warn};

/// Default number of candidates drawn before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

/// Page size used for existence checks; one hit is enough.
pub(crate) const EXISTS_PAGE_SIZE: u32 = 1;

/// Identifier space a candidate is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdNamespace {
    /// `posixGroup` entries keyed by `gidNumber`.
    Group,
    /// `posixAccount` entries keyed by `uidNumber`.
    User,
}

impl IdNamespace {
    /// Object class of records in this namespace.
    #[must_use]
    pub const fn object_class(self) -> &'static str {
        match self {
            Self::Group => "posixGroup",
            Self::User => "posixAccount",
        }
    }

    /// Attribute holding the numeric identifier.
    #[must_use]
    pub const fn id_attribute(self) -> &'static str {
        match self {
            Self::Group => "gidNumber",
            Self::User => "uidNumber",
        }
    }

    /// Human-readable record kind.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::User => "user",
        }
    }

    /// `(&(objectClass=<class>)(<id attribute>=<id>))`
    #[must_use]
    pub fn id_filter(self, id: u32) -> Filter {
        Filter::and([
            Filter::object_class(self.object_class()),
            Filter::equal(self.id_attribute(), id),
        ])
    }

    /// `(&(objectClass=<class>)(cn=<name>))`
    #[must_use]
    pub fn name_filter(self, name: &str) -> Filter {
        Filter::and([
            Filter::object_class(self.object_class()),
            Filter::equal("cn", name),
        ])
    }

    fn id_attributes(self) -> &'static [&'static str] {
        match self {
            Self::Group => &["cn", "gidNumber"],
            Self::User => &["cn", "uidNumber"],
        }
    }
}

impl fmt::Display for IdNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Returns true if a record in `namespace` already holds `id`.
///
/// # Errors
///
/// Propagates directory failures.
pub async fn id_taken<D>(
    directory: &mut D,
    search_base: &str,
    namespace: IdNamespace,
    id: u32,
) -> Result<bool>
where
    D: Directory + ?Sized,
{
    directory
        .exists(
            search_base,
            &namespace.id_filter(id),
            namespace.id_attributes(),
            EXISTS_PAGE_SIZE,
        )
        .await
}

/// Returns true if a record in `namespace` already has common name `name`.
///
/// # Errors
///
/// Propagates directory failures.
pub async fn name_taken<D>(
    directory: &mut D,
    search_base: &str,
    namespace: IdNamespace,
    name: &str,
) -> Result<bool>
where
    D: Directory + ?Sized,
{
    directory
        .exists(
            search_base,
            &namespace.name_filter(name),
            &["cn"],
            EXISTS_PAGE_SIZE,
        )
        .await
}

/// Draws random identifiers until one is free in every requested namespace.
///
/// The result is not a reservation: another client can take the same identifier between the
/// check and the add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAllocator {
    range: IdRange,
    max_attempts: u32,
}

impl IdAllocator {
    /// Creates an allocator over `range` with [`DEFAULT_MAX_ATTEMPTS`].
    #[must_use]
    pub const fn new(range: IdRange) -> Self {
        Self {
            range,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Overrides the number of candidates drawn before failing.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Range candidates are drawn from.
    #[must_use]
    pub const fn range(&self) -> IdRange {
        self.range
    }

    /// Candidate budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Finds an identifier unused in all of `namespaces` under `search_base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExhaustedRange`] when the budget runs out, or propagates directory
    /// failures.
    pub async fn allocate<D>(
        &self,
        directory: &mut D,
        search_base: &str,
        namespaces: &[IdNamespace],
    ) -> Result<u32>
    where
        D: Directory + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.draw();
            let mut collision = None;
            for namespace in namespaces {
                if id_taken(directory, search_base, *namespace, candidate).await? {
                    collision = Some(*namespace);
                    break;
                }
            }

            match collision {
                None => {
                    debug!(id = candidate, attempt, "allocated identifier");
                    return Ok(candidate);
                }
                Some(namespace) => {
                    debug!(id = candidate, attempt, %namespace, "identifier in use");
                }
            }
        }

        warn!(
            low = self.range.low(),
            high = self.range.high(),
            size = self.range.size(),
            attempts = self.max_attempts,
            "identifier range exhausted"
        );
        Err(Error::ExhaustedRange {
            low: self.range.low(),
            high: self.range.high(),
            attempts: self.max_attempts,
        })
    }

    fn draw(&self) -> u32 {
        rand::thread_rng().gen_range(self.range.low()..=self.range.high())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use posixdir_ldap::NewEntry;
    use std::collections::BTreeMap;

    /// Answers existence checks from a list of attribute maps.
    #[derive(Default)]
    struct Records {
        entries: Vec<BTreeMap<String, Vec<String>>>,
        queries: usize,
    }

    impl Records {
        fn with_ids(namespace: IdNamespace, ids: impl IntoIterator<Item = u32>) -> Self {
            let entries = ids
                .into_iter()
                .map(|id| {
                    let mut attributes = BTreeMap::new();
                    attributes.insert(
                        "objectClass".to_string(),
                        vec![namespace.object_class().to_string()],
                    );
                    attributes.insert(namespace.id_attribute().to_string(), vec![id.to_string()]);
                    attributes
                })
                .collect();
            Self {
                entries,
                queries: 0,
            }
        }
    }

    #[async_trait]
    impl Directory for Records {
        async fn exists(
            &mut self,
            _search_base: &str,
            filter: &Filter,
            _attributes: &[&'static str],
            _page_size: u32,
        ) -> Result<bool> {
            self.queries += 1;
            Ok(self.entries.iter().any(|entry| filter.matches(entry)))
        }

        async fn add(&mut self, _entry: &NewEntry) -> Result<()> {
            Err(Error::InvalidRequest("read-only".to_string()))
        }
    }

    #[test]
    fn namespace_filters() {
        assert_eq!(
            IdNamespace::Group.id_filter(5001).to_string(),
            "(&(objectClass=posixGroup)(gidNumber=5001))"
        );
        assert_eq!(
            IdNamespace::User.name_filter("ana").to_string(),
            "(&(objectClass=posixAccount)(cn=ana))"
        );
    }

    #[tokio::test]
    async fn empty_directory_allocates_within_range() {
        let mut directory = Records::default();
        let allocator = IdAllocator::new(IdRange::default());

        for _ in 0..50 {
            let id = allocator
                .allocate(
                    &mut directory,
                    "dc=example,dc=com",
                    &[IdNamespace::Group, IdNamespace::User],
                )
                .await
                .unwrap();
            assert!((5000..=50000).contains(&id));
        }
    }

    #[tokio::test]
    async fn finds_the_single_free_identifier() {
        let range = IdRange::new(100, 104).unwrap();
        let mut directory = Records::with_ids(IdNamespace::Group, [100, 101, 103, 104]);

        let id = IdAllocator::new(range)
            .allocate(&mut directory, "dc=example,dc=com", &[IdNamespace::Group])
            .await
            .unwrap();
        assert_eq!(id, 102);
    }

    #[tokio::test]
    async fn collision_in_any_namespace_rejects_candidate() {
        let range = IdRange::new(7, 8).unwrap();
        let mut groups = Records::with_ids(IdNamespace::Group, [7]);
        groups
            .entries
            .extend(Records::with_ids(IdNamespace::User, [8]).entries);

        let result = IdAllocator::new(range)
            .with_max_attempts(200)
            .allocate(&mut groups, "dc=example,dc=com", &[IdNamespace::Group, IdNamespace::User])
            .await;
        assert_eq!(
            result,
            Err(Error::ExhaustedRange {
                low: 7,
                high: 8,
                attempts: 200
            })
        );

        let id = IdAllocator::new(range)
            .allocate(&mut groups, "dc=example,dc=com", &[IdNamespace::Group])
            .await
            .unwrap();
        assert_eq!(id, 8);
    }

    #[tokio::test]
    async fn exhaustion_is_bounded() {
        let range = IdRange::new(1, 3).unwrap();
        let mut directory = Records::with_ids(IdNamespace::User, 1..=3);

        let result = IdAllocator::new(range)
            .with_max_attempts(25)
            .allocate(&mut directory, "dc=example,dc=com", &[IdNamespace::User])
            .await;
        assert!(matches!(result, Err(Error::ExhaustedRange { attempts: 25, .. })));
        assert_eq!(directory.queries, 25);
    }

    #[tokio::test]
    async fn single_value_range() {
        let range = IdRange::new(42, 42).unwrap();
        let mut directory = Records::default();
        let id = IdAllocator::new(range)
            .allocate(&mut directory, "dc=example,dc=com", &[IdNamespace::Group])
            .await
            .unwrap();
        assert_eq!(id, 42);
    }
}
