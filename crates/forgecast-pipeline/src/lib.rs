#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! The seven pipeline stages (component F, spec section 4.6): total,
//! idempotent functions over `FileEntry × ExternalServices`. [`run_next_stage`]
//! is the single entry point the queue worker drives: it looks up the next
//! incomplete stage from the entry's checkpoints, runs it, and records the
//! checkpoint (or, for Upload, resolves the final status per the configured
//! partial-failure policy).

mod analyze;
mod approve;
mod generate;
mod merge;
mod prepare;
mod rename;
mod scan;
mod screenshot;
mod services;
#[cfg(test)]
mod test_support;
mod tokens;
mod upload;

pub use services::{ExternalServices, TrackerHandle};
pub use tokens::FilenameTokens;

use chrono::Utc;
use forgecast_domain::{ErrorKind, FileEntry, PipelineResult, Stage};

/// Run the next incomplete stage of `entry`, if any.
///
/// Returns `Ok(false)` without doing anything if every stage has already
/// completed or the entry is in a terminal status. On a stage error, the
/// entry is left unmodified with respect to its checkpoint (the caller
/// decides whether to requeue based on [`forgecast_domain::PipelineError::retryable`]).
///
/// # Errors
///
/// Propagates whatever classified error the stage itself raised.
pub async fn run_next_stage(entry: &mut FileEntry, services: &ExternalServices) -> PipelineResult<bool> {
    let Some(stage) = entry.next_stage() else {
        return Ok(false);
    };

    match stage {
        Stage::Scan => scan::run(entry, services).await?,
        Stage::Analyze => analyze::run(entry, services).await?,
        Stage::Approve => approve::run(entry, services).await?,
        Stage::Prepare => prepare::run(entry, services).await?,
        Stage::Rename => rename::run(entry, services).await?,
        Stage::Generate => generate::run(entry, services).await?,
        Stage::Upload => {
            upload::run(entry, services).await?;
            let now = Utc::now();
            if upload::succeeded(entry, services.policy.partial_failure) {
                entry.record_checkpoint(Stage::Upload, now)?;
            } else {
                entry.mark_failed(ErrorKind::TrackerPermanent, "no tracker upload succeeded", now);
            }
            return Ok(true);
        }
    }

    entry.record_checkpoint(stage, Utc::now())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stub_services;

    #[tokio::test]
    async fn run_next_stage_is_a_no_op_once_every_stage_completed() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        for stage in Stage::ALL {
            entry.record_checkpoint(stage, Utc::now()).unwrap();
        }
        let services = stub_services(&std::env::temp_dir());
        assert!(!run_next_stage(&mut entry, &services).await.unwrap());
    }

    #[tokio::test]
    async fn run_next_stage_runs_scan_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("movie.mkv");
        tokio::fs::write(&path, b"bytes").await.unwrap();
        let mut entry = FileEntry::new(path.to_string_lossy().into_owned());
        let services = stub_services(dir.path());

        assert!(run_next_stage(&mut entry, &services).await.unwrap());
        assert_eq!(entry.status, forgecast_domain::FileEntryStatus::Scanned);
    }
}
