//! Provisioning of POSIX groups and users into an LDAP directory.
//!
//! The [`Provisioner`] drives each creation: it checks names, draws a free identifier with the
//! [`IdAllocator`], renders a record [`template`], parses it with [`ldif::parse`] and submits the
//! result through a [`posixdir_ldap::Directory`] session.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocator;
pub mod ldif;
pub mod password;
pub mod provisioner;
pub mod template;

pub use allocator::{IdAllocator, IdNamespace, DEFAULT_MAX_ATTEMPTS};
pub use ldif::DirectoryRecord;
pub use password::{generate_password, EncodedPassword};
pub use provisioner::{GroupCreated, Provisioner, Stage, UserCreated, UserSpec};
pub use template::{GroupParams, RecordTemplate, UserParams};
