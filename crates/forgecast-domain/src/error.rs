//! The cross-cutting error taxonomy every stage, adapter, and client maps into.

use thiserror::Error;

/// Convenience alias for pipeline operation results.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Structured error raised anywhere in the publication pipeline.
///
/// Every variant corresponds to exactly one [`ErrorKind`]; the mapping is
/// fixed so the queue worker can decide requeue-vs-fail without inspecting
/// the concrete variant.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transient network failure (connect/read timeout, DNS, reset, 5xx).
    #[error("network transient failure during {operation}")]
    NetworkTransient {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// HTTP 429 from an external service.
    #[error("rate limited during {operation}")]
    RateLimited {
        /// Operation that was rate limited.
        operation: &'static str,
        /// Server-supplied retry delay, if any.
        retry_after: Option<std::time::Duration>,
    },
    /// A circuit breaker guarding `dependency` is currently OPEN.
    #[error("circuit open for dependency {dependency}")]
    CircuitOpen {
        /// Name of the dependency whose breaker tripped.
        dependency: String,
    },
    /// Authentication or authorization was rejected with no transient signal.
    #[error("auth rejected during {operation}")]
    AuthRejected {
        /// Operation that failed authentication.
        operation: &'static str,
    },
    /// A declarative schema or payload failed validation.
    #[error("validation failed for field {field}: {reason}")]
    ValidationError {
        /// Field that failed validation.
        field: String,
        /// Human-readable reason.
        reason: String,
    },
    /// A duplicate-check found a matching release on a tracker.
    #[error("duplicate release on tracker {tracker_slug}")]
    DuplicateRelease {
        /// Tracker slug on which the duplicate was found.
        tracker_slug: String,
    },
    /// A tracker returned a permanent 4xx (other than 408/429) failure.
    #[error("tracker {tracker_slug} rejected {operation} permanently")]
    TrackerPermanent {
        /// Tracker slug that rejected the request.
        tracker_slug: String,
        /// Operation that was rejected.
        operation: &'static str,
        /// Human-readable detail extracted from the tracker's response.
        detail: String,
    },
    /// An external dependency is unavailable with no usable cached fallback.
    #[error("external service {service} unavailable")]
    ExternalUnavailable {
        /// Name of the unavailable service.
        service: &'static str,
    },
    /// An invariant that should be unreachable was violated.
    #[error("internal invariant violated: {detail}")]
    InternalInvariant {
        /// Description of the violated invariant.
        detail: String,
    },
    /// The operation was cancelled cooperatively.
    #[error("operation cancelled")]
    UserCancelled,
}

/// Taxonomy kind, independent of the concrete error variant. Stored on
/// [`crate::model::FileEntry::error_kind`] and reported in events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`PipelineError::NetworkTransient`].
    NetworkTransient,
    /// See [`PipelineError::RateLimited`].
    RateLimited,
    /// See [`PipelineError::CircuitOpen`].
    CircuitOpen,
    /// See [`PipelineError::AuthRejected`].
    AuthRejected,
    /// See [`PipelineError::ValidationError`].
    ValidationError,
    /// See [`PipelineError::DuplicateRelease`].
    DuplicateRelease,
    /// See [`PipelineError::TrackerPermanent`].
    TrackerPermanent,
    /// See [`PipelineError::ExternalUnavailable`].
    ExternalUnavailable,
    /// See [`PipelineError::InternalInvariant`].
    InternalInvariant,
    /// See [`PipelineError::UserCancelled`].
    UserCancelled,
}

impl ErrorKind {
    /// Whether the worker should requeue the job for this kind of failure.
    ///
    /// `CircuitOpen` and `ExternalUnavailable` are retryable but bounded: the
    /// worker still honors `max_attempts`, it simply doesn't treat them as an
    /// immediate hard stop the way `ValidationError` is treated.
    #[must_use]
    pub const fn retryable(self) -> bool {
        matches!(
            self,
            Self::NetworkTransient
                | Self::RateLimited
                | Self::CircuitOpen
                | Self::ExternalUnavailable
        )
    }

    /// Machine-friendly discriminator, stable across releases.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkTransient => "network_transient",
            Self::RateLimited => "rate_limited",
            Self::CircuitOpen => "circuit_open",
            Self::AuthRejected => "auth_rejected",
            Self::ValidationError => "validation_error",
            Self::DuplicateRelease => "duplicate_release",
            Self::TrackerPermanent => "tracker_permanent",
            Self::ExternalUnavailable => "external_unavailable",
            Self::InternalInvariant => "internal_invariant",
            Self::UserCancelled => "user_cancelled",
        }
    }
}

impl PipelineError {
    /// Classify this error into its taxonomy kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkTransient { .. } => ErrorKind::NetworkTransient,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::AuthRejected { .. } => ErrorKind::AuthRejected,
            Self::ValidationError { .. } => ErrorKind::ValidationError,
            Self::DuplicateRelease { .. } => ErrorKind::DuplicateRelease,
            Self::TrackerPermanent { .. } => ErrorKind::TrackerPermanent,
            Self::ExternalUnavailable { .. } => ErrorKind::ExternalUnavailable,
            Self::InternalInvariant { .. } => ErrorKind::InternalInvariant,
            Self::UserCancelled => ErrorKind::UserCancelled,
        }
    }

    /// Whether the worker should requeue the job for this failure.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        self.kind().retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_taxonomy() {
        assert!(ErrorKind::NetworkTransient.retryable());
        assert!(ErrorKind::RateLimited.retryable());
        assert!(ErrorKind::CircuitOpen.retryable());
        assert!(ErrorKind::ExternalUnavailable.retryable());
        assert!(!ErrorKind::AuthRejected.retryable());
        assert!(!ErrorKind::ValidationError.retryable());
        assert!(!ErrorKind::DuplicateRelease.retryable());
        assert!(!ErrorKind::TrackerPermanent.retryable());
        assert!(!ErrorKind::InternalInvariant.retryable());
        assert!(!ErrorKind::UserCancelled.retryable());
    }

    #[test]
    fn error_kind_round_trips_through_error_variants() {
        let err = PipelineError::TrackerPermanent {
            tracker_slug: "demo".to_string(),
            operation: "upload",
            detail: "invalid category".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::TrackerPermanent);
        assert!(!err.retryable());
    }
}
