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

//! Loads and validates the core configuration mapping (spec section 6). The
//! core never parses CLI args or environment variables itself; that is the
//! job of the `forgecast-cli` binary, which loads a [`CoreConfig`] from YAML
//! and hands it to the rest of the workspace as a value.

pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_path, load_from_str};
pub use model::{
    ApprovePolicy, CoreConfig, PartialFailurePolicy, PolicySettings, RateLimitOverride,
    TrackerCredentials, TrackerEntry,
};
