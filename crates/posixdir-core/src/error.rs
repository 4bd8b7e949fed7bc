//! Error types for provisioning operations.
//!
//! Every failure the provisioning engine can raise maps onto one variant of [`Error`]. None of
//! them are retried inside the library; they propagate unmodified to the caller.

use thiserror::Error;

/// Main error type for provisioning operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Missing or invalid configuration, reported before any directory contact
    #[error("Configuration error: {0}")]
    Config(String),

    /// Directory unreachable, TLS negotiation or bind failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Directory operation timed out
    #[error("Timeout waiting for directory: {0}")]
    Timeout(String),

    /// A record with the requested common name already exists
    #[error("{kind} `{name}` already exists")]
    NameConflict {
        /// Kind of record (`group` or `user`)
        kind: String,
        /// Colliding name
        name: String,
    },

    /// A record already holds the requested numeric identifier
    #[error("{namespace} {id} already exists")]
    IdConflict {
        /// Identifier attribute (`gidNumber` or `uidNumber`)
        namespace: String,
        /// Colliding identifier
        id: u32,
    },

    /// The directory refused the add because the entry already exists
    #[error("Entry already exists: {0}")]
    ExistsConflict(String),

    /// No free identifier was found within the attempt budget
    #[error("No free identifier in [{low}, {high}] after {attempts} attempts")]
    ExhaustedRange {
        /// Inclusive lower bound
        low: u32,
        /// Inclusive upper bound
        high: u32,
        /// Number of candidates drawn
        attempts: u32,
    },

    /// A rendered document contained a line that is not `key: value`
    #[error("Malformed record line: {line:?}")]
    MalformedRecord {
        /// Offending line
        line: String,
    },

    /// A rendered document lacked a distinguished name or object classes
    #[error("Incomplete record: {0}")]
    IncompleteRecord(String),

    /// The directory rejected an operation
    #[error("Directory rejected operation (rc={code}): {message}")]
    DirectoryRejected {
        /// LDAP result code
        code: u32,
        /// Diagnostic text returned by the server
        message: String,
    },

    /// Invalid caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Specialized result type for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NameConflict { .. } => "NAME_CONFLICT",
            Self::IdConflict { .. } => "ID_CONFLICT",
            Self::ExistsConflict(_) => "EXISTS_CONFLICT",
            Self::ExhaustedRange { .. } => "EXHAUSTED_RANGE",
            Self::MalformedRecord { .. } => "MALFORMED_RECORD",
            Self::IncompleteRecord(_) => "INCOMPLETE_RECORD",
            Self::DirectoryRejected { .. } => "DIRECTORY_REJECTED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Returns true if this error points at a defect or an environment problem rather than a
    /// conflicting caller request.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Connection(_)
                | Self::MalformedRecord { .. }
                | Self::IncompleteRecord(_)
                | Self::DirectoryRejected { .. }
        )
    }

    /// Returns true for uniqueness violations, whether detected by a pre-check or by the
    /// directory itself.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::NameConflict { .. } | Self::IdConflict { .. } | Self::ExistsConflict(_)
        )
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid directory URI: {err}"))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}
