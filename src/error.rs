/*!
 * Error types for Ferry
 */

use std::fmt;
use std::io;

use ferry_core_interface::MirrorSystemError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// Mutually exclusive filters requested together
    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    /// Malformed channel-entry name or version bound
    #[error("unable to parse version from {input:?}: {reason}")]
    VersionParse { input: String, reason: String },

    /// Image address that cannot be split into its components
    #[error("invalid image reference {reference:?}: {reason}")]
    ReferenceParse { reference: String, reason: String },

    /// A copy entry reached the mirror-set generator without its upstream reference
    #[error("unable to generate IDMS/ITMS: original reference for ({source_ref},{destination}) undetermined")]
    MissingOrigin {
        source_ref: String,
        destination: String,
    },

    /// Catalog content that prevents resolving a package
    #[error("catalog error: {0}")]
    Catalog(String),

    /// At least one copy of a batch failed
    #[error("error in batch - refer to logs")]
    BatchAbort { batch: usize, failed: usize },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(String),

    /// Error surfaced by the copy capability
    #[error(transparent)]
    System(#[from] MirrorSystemError),

    /// The run was cancelled before it completed
    #[error("operation cancelled")]
    Cancelled,
}

impl MirrorError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            MirrorError::ConfigurationConflict(_)
            | MirrorError::ReferenceParse { .. }
            | MirrorError::MissingOrigin { .. }
            | MirrorError::Catalog(_)
            | MirrorError::Config(_)
            | MirrorError::Toml(_) => EXIT_FATAL,
            MirrorError::BatchAbort { .. } | MirrorError::System(_) | MirrorError::Cancelled => {
                EXIT_PARTIAL
            }
            _ => EXIT_PARTIAL,
        }
    }

    /// Check if this error stops the whole run
    pub fn is_fatal(&self) -> bool {
        match self {
            MirrorError::ConfigurationConflict(_) => true,
            MirrorError::ReferenceParse { .. } => true,
            MirrorError::MissingOrigin { .. } => true,
            MirrorError::Catalog(_) => true,
            MirrorError::BatchAbort { .. } => true,
            MirrorError::Config(_) => true,
            MirrorError::Toml(_) => true,
            MirrorError::Cancelled => true,

            // Recoverable at entry granularity
            MirrorError::VersionParse { .. } => false,
            MirrorError::Io(_) => false,
            MirrorError::Json(_) => false,
            MirrorError::Yaml(_) => false,
            MirrorError::System(e) => e.is_cancelled(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            MirrorError::ConfigurationConflict(_) | MirrorError::Config(_) => {
                ErrorCategory::Configuration
            }
            MirrorError::VersionParse { .. } => ErrorCategory::Version,
            MirrorError::ReferenceParse { .. } | MirrorError::MissingOrigin { .. } => {
                ErrorCategory::Reference
            }
            MirrorError::Catalog(_) => ErrorCategory::Catalog,
            MirrorError::BatchAbort { .. } => ErrorCategory::Batch,
            MirrorError::Io(_) => ErrorCategory::IoError,
            MirrorError::Json(_) | MirrorError::Yaml(_) | MirrorError::Toml(_) => {
                ErrorCategory::Serialization
            }
            MirrorError::System(_) => ErrorCategory::Transport,
            MirrorError::Cancelled => ErrorCategory::Cancelled,
        }
    }
}

impl From<toml::de::Error> for MirrorError {
    fn from(err: toml::de::Error) -> Self {
        MirrorError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for MirrorError {
    fn from(err: toml::ser::Error) -> Self {
        MirrorError::Toml(err.to_string())
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid or conflicting settings
    Configuration,
    /// Channel entry and bound versions
    Version,
    /// Image references
    Reference,
    /// Catalog content
    Catalog,
    /// Batch copy failures
    Batch,
    /// I/O operation errors
    IoError,
    /// JSON, YAML and TOML encoding
    Serialization,
    /// Copy transport
    Transport,
    /// Cancellation
    Cancelled,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Version => write!(f, "version"),
            ErrorCategory::Reference => write!(f, "reference"),
            ErrorCategory::Catalog => write!(f, "catalog"),
            ErrorCategory::Batch => write!(f, "batch"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Serialization => write!(f, "serialization"),
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Cancelled => write!(f, "cancelled"),
        }
    }
}
