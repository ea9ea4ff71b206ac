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
    rustdoc::bare_urls
)]
#![allow(clippy::multiple_crate_versions)]

//! Binary entrypoint: parses arguments, then wires and runs the forgecast
//! publication pipeline service.

/// Dependency wiring and the run loop.
pub mod bootstrap;
/// Argument and environment parsing.
pub mod cli;
/// Filesystem discovery loop.
pub mod discover;
/// Application-level error type.
pub mod error;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    bootstrap::run(cli).await?;
    Ok(())
}
