//! Errors raised while loading or validating the core configuration.

use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed as YAML.
    #[error("failed to parse configuration document")]
    Parse {
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
    /// The configuration document could not be read from disk.
    #[error("failed to read configuration file {path}")]
    Io {
        /// Path that could not be read.
        path: std::path::PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A required field was missing or structurally invalid.
    #[error("invalid configuration field `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// Two trackers declared the same slug.
    #[error("duplicate tracker slug `{slug}`")]
    DuplicateTrackerSlug {
        /// The slug that appeared more than once.
        slug: String,
    },
}
