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

//! Parses a tracker's declarative schema document (spec section 4.5) and
//! turns it into working HTTP behaviour: authentication, search,
//! duplicate-check, and upload (component E), guarded by `forgecast-resilience`.

pub mod adapter;
pub mod context;
pub mod error;
pub mod fields;
pub mod options;
pub mod sanitize;
pub mod schema;
pub mod search;
pub mod validate;

pub use adapter::TrackerAdapter;
pub use context::BuildContext;
pub use error::{SchemaError, SchemaResult};
pub use fields::ResolvedField;
pub use schema::{parse, TrackerSchema};
pub use search::SearchResult;
