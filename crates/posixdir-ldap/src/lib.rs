//! LDAP directory facade for POSIX identity provisioning.
//!
//! This crate wraps an `ldap3` connection behind a small [`Directory`] trait: existence checks
//! over paged searches and submission of new entries. It also reads `posixAccount` entries back
//! for listing.

#![deny(missing_docs)]

mod account;
mod client;
mod config;
mod entry;
mod filter;

pub use account::{PosixAccount, ACCOUNT_ATTRIBUTES};
pub use client::{Directory, DirectoryClient, DirectorySession, SearchPage};
pub use config::{BindCredentials, LdapConfig};
pub use entry::{LdapEntry, NewEntry};
pub use filter::Filter;

/// Convenient result alias that reuses the core error type.
pub type Result<T> = posixdir_core::Result<T>;
