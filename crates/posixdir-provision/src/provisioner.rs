//! Group and user creation workflows.
//!
//! Each workflow walks through [`Stage`]s: name checks, identifier allocation, rendering,
//! parsing and submission. Pre-checks are best effort; the directory itself arbitrates races at
//! `add` time. A user is created as two independent adds (primary group, then account). The
//! account entry is rendered and parsed before the group is written; if the account add or its
//! re-checks fail, the group stays in place and the error is returned unchanged.

use crate::allocator::{id_taken, name_taken, IdAllocator, IdNamespace};
use crate::ldif::parse;
use crate::password::EncodedPassword;
use crate::template::{GroupParams, UserParams};
use posixdir_core::{DistinguishedName, Error, ProvisionConfig, Result};
use posixdir_ldap::{Directory, NewEntry};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Workflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Checking names and identifiers against the directory.
    Validating,
    /// Drawing a free identifier.
    AllocatingId,
    /// Rendering the record template.
    Rendering,
    /// Parsing the rendered document.
    Parsing,
    /// Submitting the add request.
    Submitting,
    /// Finished successfully.
    Done,
    /// Stopped on an error.
    Aborted,
}

impl Stage {
    /// Stage name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::AllocatingId => "allocating_id",
            Self::Rendering => "rendering",
            Self::Parsing => "parsing",
            Self::Submitting => "submitting",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and logs the stage of one workflow run.
#[derive(Debug)]
struct Progress {
    operation: &'static str,
    name: String,
    stage: Stage,
}

impl Progress {
    fn start(operation: &'static str, name: &str) -> Self {
        let progress = Self {
            operation,
            name: name.to_string(),
            stage: Stage::Validating,
        };
        debug!(operation, name, stage = %progress.stage, "provisioning stage");
        progress
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        debug!(operation = self.operation, name = %self.name, stage = %stage, "provisioning stage");
    }

    fn finish<T>(&mut self, result: &Result<T>) {
        let Err(err) = result else {
            self.enter(Stage::Done);
            return;
        };
        if err.should_log() {
            error!(
                operation = self.operation,
                name = %self.name,
                stage = %self.stage,
                code = err.error_code(),
                error = %err,
                "provisioning failed"
            );
        } else {
            warn!(
                operation = self.operation,
                name = %self.name,
                stage = %self.stage,
                code = err.error_code(),
                conflict = err.is_conflict(),
                error = %err,
                "provisioning aborted"
            );
        }
        self.stage = Stage::Aborted;
    }
}

/// Inputs for creating a user.
#[derive(Debug, Clone)]
pub struct UserSpec {
    /// Login name; also the name of the primary group.
    pub user_name: String,
    /// Given name.
    pub given_name: String,
    /// Family name.
    pub family_name: String,
    /// Encoded password.
    pub password: EncodedPassword,
}

/// Outcome of a group creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCreated {
    /// Group common name.
    pub name: String,
    /// Assigned `gidNumber`.
    pub gid: u32,
    /// DN of the new entry.
    pub dn: DistinguishedName,
}

/// Outcome of a user creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCreated {
    /// Login name.
    pub name: String,
    /// Shared `uidNumber` and `gidNumber`.
    pub id: u32,
    /// DN of the account entry.
    pub user_dn: DistinguishedName,
    /// DN of the primary group entry.
    pub group_dn: DistinguishedName,
}

/// Provisions POSIX groups and users through a bound directory session.
pub struct Provisioner<'a, D: Directory + ?Sized> {
    directory: &'a mut D,
    domain_dn: DistinguishedName,
    domain_dns: String,
    allocator: IdAllocator,
    orphaned_group: Option<DistinguishedName>,
}

impl<'a, D: Directory + ?Sized> Provisioner<'a, D> {
    /// Creates a provisioner for the domain rooted at `domain_dn`.
    pub fn new(
        directory: &'a mut D,
        domain_dn: DistinguishedName,
        domain_dns: impl Into<String>,
        allocator: IdAllocator,
    ) -> Self {
        Self {
            directory,
            domain_dn,
            domain_dns: domain_dns.into(),
            allocator,
            orphaned_group: None,
        }
    }

    /// Creates a provisioner from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the root DN, root DNS name or id range is invalid.
    pub fn from_config(directory: &'a mut D, config: &ProvisionConfig) -> Result<Self> {
        Ok(Self::new(
            directory,
            config.root_dn()?,
            config.root_dns()?,
            IdAllocator::new(config.id_range()?),
        ))
    }

    /// Root DN every check and add is scoped to.
    #[must_use]
    pub const fn domain_dn(&self) -> &DistinguishedName {
        &self.domain_dn
    }

    /// Primary group left behind by the last failed [`Provisioner::create_user`] call.
    #[must_use]
    pub const fn orphaned_group(&self) -> Option<&DistinguishedName> {
        self.orphaned_group.as_ref()
    }

    /// Creates a `posixGroup`, allocating a `gidNumber` unless `gid` is given.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for a blank or multi-line name,
    /// [`Error::NameConflict`] or [`Error::IdConflict`] from the pre-checks,
    /// [`Error::ExhaustedRange`] from allocation, or any rendering, parsing or directory error.
    pub async fn create_group(&mut self, name: &str, gid: Option<u32>) -> Result<GroupCreated> {
        let mut progress = Progress::start("create_group", name);
        let result = self.run_create_group(name, gid, &mut progress).await;
        progress.finish(&result);
        if let Ok(created) = &result {
            info!(group = %created.name, gid = created.gid, dn = %created.dn, "group created");
        }
        result
    }

    async fn run_create_group(
        &mut self,
        name: &str,
        gid: Option<u32>,
        progress: &mut Progress,
    ) -> Result<GroupCreated> {
        require_value("group name", name)?;
        let base = self.domain_dn.to_string();
        if name_taken(&mut *self.directory, &base, IdNamespace::Group, name).await? {
            return Err(Error::NameConflict {
                kind: IdNamespace::Group.kind().to_string(),
                name: name.to_string(),
            });
        }

        let gid = match gid {
            Some(gid) => gid,
            None => {
                progress.enter(Stage::AllocatingId);
                self.allocator
                    .allocate(&mut *self.directory, &base, &[IdNamespace::Group])
                    .await?
            }
        };

        progress.enter(Stage::Validating);
        if id_taken(&mut *self.directory, &base, IdNamespace::Group, gid).await? {
            return Err(Error::IdConflict {
                namespace: IdNamespace::Group.id_attribute().to_string(),
                id: gid,
            });
        }

        progress.enter(Stage::Rendering);
        let document = GroupParams {
            domain_dn: base,
            group_name: name.to_string(),
            gid_number: gid,
        }
        .render()?;

        let entry = prepare(&document, progress)?;
        self.submit(&entry, progress).await?;
        Ok(GroupCreated {
            name: name.to_string(),
            gid,
            dn: entry.dn().clone(),
        })
    }

    /// Creates a user and its primary group sharing one identifier.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for empty or multi-line fields, then any error from the
    /// pre-checks, allocation, rendering, the group step or the account step. Only an error from
    /// the account step leaves the group in the directory.
    pub async fn create_user(&mut self, spec: &UserSpec) -> Result<UserCreated> {
        self.orphaned_group = None;
        let mut progress = Progress::start("create_user", &spec.user_name);
        let result = self.run_create_user(spec, &mut progress).await;
        progress.finish(&result);
        if let Ok(created) = &result {
            info!(user = %created.name, id = created.id, dn = %created.user_dn, "user created");
        }
        result
    }

    async fn run_create_user(
        &mut self,
        spec: &UserSpec,
        progress: &mut Progress,
    ) -> Result<UserCreated> {
        let name = spec.user_name.as_str();
        require_value("user name", name)?;
        require_value("given name", &spec.given_name)?;
        require_value("family name", &spec.family_name)?;

        let base = self.domain_dn.to_string();
        self.ensure_name_free(&base, IdNamespace::User, name).await?;
        self.ensure_name_free(&base, IdNamespace::Group, name).await?;

        progress.enter(Stage::AllocatingId);
        let id = self
            .allocator
            .allocate(
                &mut *self.directory,
                &base,
                &[IdNamespace::Group, IdNamespace::User],
            )
            .await?;

        // The account entry is built before the group is written.
        progress.enter(Stage::Rendering);
        let document = UserParams {
            domain_dn: base.clone(),
            domain_dns: self.domain_dns.clone(),
            user_name: spec.user_name.clone(),
            user_password: spec.password.clone(),
            given_name: spec.given_name.clone(),
            family_name: spec.family_name.clone(),
            uid_number: id,
            gid_number: id,
        }
        .render()?;
        let account = prepare(&document, progress)?;

        let group = self.create_group(name, Some(id)).await?;

        match self.submit_account(name, &account, id, &base, progress).await {
            Ok(()) => Ok(UserCreated {
                name: name.to_string(),
                id,
                user_dn: account.dn().clone(),
                group_dn: group.dn,
            }),
            Err(err) => {
                warn!(
                    user = name,
                    group_dn = %group.dn,
                    error = %err,
                    "account creation failed; primary group left in place"
                );
                self.orphaned_group = Some(group.dn);
                Err(err)
            }
        }
    }

    async fn submit_account(
        &mut self,
        name: &str,
        account: &NewEntry,
        id: u32,
        base: &str,
        progress: &mut Progress,
    ) -> Result<()> {
        progress.enter(Stage::Validating);
        self.ensure_name_free(base, IdNamespace::User, name).await?;
        if id_taken(&mut *self.directory, base, IdNamespace::User, id).await? {
            return Err(Error::IdConflict {
                namespace: IdNamespace::User.id_attribute().to_string(),
                id,
            });
        }

        self.submit(account, progress).await
    }

    async fn ensure_name_free(
        &mut self,
        base: &str,
        namespace: IdNamespace,
        name: &str,
    ) -> Result<()> {
        if name_taken(&mut *self.directory, base, namespace, name).await? {
            return Err(Error::NameConflict {
                kind: namespace.kind().to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn submit(&mut self, entry: &NewEntry, progress: &mut Progress) -> Result<()> {
        progress.enter(Stage::Submitting);
        self.directory.add(entry).await
    }
}

fn prepare(document: &str, progress: &mut Progress) -> Result<NewEntry> {
    progress.enter(Stage::Parsing);
    parse(document)?.into_new_entry()
}

/// Rejects values that would render as an empty or extra document line.
fn require_value(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidRequest(format!("{field} must not be empty")));
    }
    if value.contains(['\n', '\r']) {
        return Err(Error::InvalidRequest(format!("{field} must not contain line breaks")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_records_terminal_stage() {
        let mut progress = Progress::start("create_group", "artists");
        assert_eq!(progress.stage, Stage::Validating);
        progress.enter(Stage::Rendering);
        progress.finish(&Ok::<(), Error>(()));
        assert_eq!(progress.stage, Stage::Done);

        let mut failed = Progress::start("create_user", "ana");
        failed.enter(Stage::Submitting);
        failed.finish(&Err::<(), _>(Error::ExistsConflict("uid=ana".to_string())));
        assert_eq!(failed.stage, Stage::Aborted);

        let mut broken = Progress::start("create_group", "artists");
        broken.enter(Stage::Parsing);
        broken.finish(&Err::<(), _>(Error::MalformedRecord {
            line: "cn:".to_string(),
        }));
        assert_eq!(broken.stage, Stage::Aborted);
    }

    #[test]
    fn blank_and_multi_line_values_are_rejected() {
        assert!(require_value("given name", "Ana").is_ok());
        assert!(matches!(
            require_value("given name", "  "),
            Err(Error::InvalidRequest(message)) if message == "given name must not be empty"
        ));
        assert!(matches!(
            require_value("family name", "Lee\nuidNumber: 0"),
            Err(Error::InvalidRequest(message)) if message.contains("line breaks")
        ));
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::AllocatingId.to_string(), "allocating_id");
        assert_eq!(Stage::Aborted.as_str(), "aborted");
    }
}
