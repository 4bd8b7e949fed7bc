//! # posixdir-core
//!
//! Core types shared by the posixdir crates.
//!
//! This crate provides the error taxonomy, distinguished name handling and the provisioning
//! configuration consumed by the directory client, the provisioning engine and the CLI.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy for provisioning operations
//! - [`dn`] - Distinguished name parsing and DNS-style rendering
//! - [`config`] - Provisioning configuration, identifier ranges and YAML layering

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dn;
pub mod error;

// Re-export commonly used types
pub use config::{IdRange, ProvisionConfig, DEFAULT_ID_RANGE_HIGH, DEFAULT_ID_RANGE_LOW};
pub use dn::{DistinguishedName, DistinguishedNameError, RelativeDistinguishedName};
pub use error::{Error, Result};
