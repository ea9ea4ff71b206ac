//! Errors raised while parsing or evaluating a tracker's declarative schema.

use thiserror::Error;

/// Errors specific to schema parsing and template/option resolution.
///
/// These are distinct from [`forgecast_domain::PipelineError`]: a
/// [`SchemaError`] is always a configuration defect (a malformed schema
/// document), never a transient network condition, so callers convert it into
/// [`forgecast_domain::PipelineError::ValidationError`] at the pipeline
/// boundary rather than retrying it.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document did not match the expected shape.
    #[error("tracker schema is malformed: {reason}")]
    Malformed {
        /// Human-readable description of the mismatch.
        reason: String,
    },
    /// A field descriptor referenced a source path that produced no value and
    /// had no default.
    #[error("required field '{field}' has no value at source path '{source_path}'")]
    MissingFieldValue {
        /// Name of the upload field.
        field: String,
        /// Dotted path that was looked up.
        source_path: String,
    },
    /// An option descriptor's semantic value had no entry in any of its
    /// mapping tables and no fallback was configured.
    #[error("option '{option}' has no mapping for value '{value}'")]
    UnmappedOptionValue {
        /// Name of the option.
        option: String,
        /// The semantic value that failed to map.
        value: String,
    },
    /// A value failed the schema's declared validation rule.
    #[error("field '{field}' failed validation: {reason}")]
    ValidationFailed {
        /// Name of the field.
        field: String,
        /// Description of the failed rule.
        reason: String,
    },
}

/// Result alias for schema and adapter operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
