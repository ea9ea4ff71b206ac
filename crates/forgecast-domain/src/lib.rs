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

//! Core entities and error taxonomy for the forgecast publication pipeline:
//! [`model::FileEntry`], [`model::QueueJob`], [`model::BatchJob`],
//! [`model::TrackerResult`], [`model::TmdbCacheEntry`], and [`error::PipelineError`].

pub mod error;
pub mod model;

pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use model::{
    BatchJob, BatchProgress, BatchStatus, FileEntry, FileEntryStatus, Priority, QueueJob,
    QueueState, Stage, TmdbCacheEntry, TrackerOutcome, TrackerResult, DEFAULT_MAX_ATTEMPTS,
};
