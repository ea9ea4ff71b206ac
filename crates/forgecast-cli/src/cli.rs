//! Argument and environment parsing (spec section 6: the core itself never
//! parses CLI args or env vars — that's this binary's job alone).

use std::path::PathBuf;

use clap::Parser;

/// Runs the forgecast publication pipeline worker.
#[derive(Debug, Parser)]
#[command(name = "forgecast", version, about)]
pub struct Cli {
    /// Path to the YAML configuration document.
    #[arg(long, env = "FORGECAST_CONFIG", default_value = "forgecast.yaml")]
    pub config: PathBuf,

    /// Log output format; defaults to pretty on a TTY and JSON otherwise.
    #[arg(long, value_enum)]
    pub log_format: Option<CliLogFormat>,
}

/// Mirrors [`forgecast_telemetry::LogFormat`] as a `clap`-friendly enum.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliLogFormat {
    /// Structured JSON log lines.
    Json,
    /// Human-readable, pretty-printed log lines.
    Pretty,
}

impl From<CliLogFormat> for forgecast_telemetry::LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Json => Self::Json,
            CliLogFormat::Pretty => Self::Pretty,
        }
    }
}
