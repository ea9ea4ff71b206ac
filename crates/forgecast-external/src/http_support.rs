//! Shared HTTP error classification for the default client implementations,
//! mirroring `forgecast-tracker`'s adapter (the pattern each protocol client
//! in this crate reuses rather than reinventing).

use forgecast_domain::{ErrorKind, PipelineError};
use forgecast_resilience::classify_http_status;

pub(crate) fn network_error(operation: &'static str, source: &reqwest::Error) -> PipelineError {
    PipelineError::NetworkTransient {
        operation,
        source: Box::new(std::io::Error::other(source.to_string())),
    }
}

pub(crate) fn classify_status(service: &'static str, operation: &'static str, status: u16) -> PipelineError {
    match classify_http_status(status, operation) {
        Some(ErrorKind::RateLimited) => PipelineError::RateLimited {
            operation,
            retry_after: None,
        },
        Some(ErrorKind::NetworkTransient) => PipelineError::NetworkTransient {
            operation,
            source: Box::new(std::io::Error::other(format!("http {status}"))),
        },
        Some(ErrorKind::AuthRejected) => PipelineError::AuthRejected { operation },
        _ => PipelineError::ExternalUnavailable { service },
    }
}
