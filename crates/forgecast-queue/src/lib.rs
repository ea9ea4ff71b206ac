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

//! Drives persisted jobs through the pipeline (component I) and tracks
//! batches of them (component J), per spec sections 4.8-4.10.

mod batch;
mod labels;
mod worker;

pub use batch::BatchController;
pub use worker::QueueWorker;
