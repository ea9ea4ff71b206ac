//! Screenshot capture for the Prepare stage. Not one of the spec's named
//! component-D contracts — the stage table only says "generate screenshots
//! (optional, skipped if tool absent)" — so this wraps the `ffmpeg` CLI the
//! same way `forgecast-external::CliMediaInfoProvider` wraps `mediainfo`:
//! shell out, and treat a missing binary as "skip", not a failure.

use std::io;

use forgecast_domain::{PipelineError, PipelineResult};
use tokio::process::Command;
use tracing::{debug, warn};

/// Evenly space `count` capture timestamps across `duration_secs`, avoiding
/// the very first and last frame.
fn timestamp_for(index: u32, count: u32, duration_secs: u64) -> u64 {
    duration_secs.saturating_mul(u64::from(index) + 1) / (u64::from(count) + 1)
}

/// Capture up to `count` evenly-spaced frames from `video_path` into `out_dir`,
/// returning the paths written. Returns an empty list, rather than an error,
/// when `ffmpeg` is not installed.
///
/// # Errors
///
/// Returns [`PipelineError::ExternalUnavailable`] if `ffmpeg` is present but
/// exits non-zero.
pub(crate) async fn capture(video_path: &str, duration_secs: u64, count: u32, out_dir: &str) -> PipelineResult<Vec<String>> {
    tokio::fs::create_dir_all(out_dir).await.map_err(|source| PipelineError::ValidationError {
        field: "output_dir".to_string(),
        reason: format!("failed to create screenshot directory: {source}"),
    })?;

    let mut paths = Vec::with_capacity(count as usize);
    for index in 0..count {
        let timestamp = timestamp_for(index, count, duration_secs);
        let out_path = format!("{out_dir}/screenshot_{index:02}.jpg");

        let status = Command::new("ffmpeg")
            .args(["-y", "-ss"])
            .arg(timestamp.to_string())
            .args(["-i", video_path, "-frames:v", "1", "-q:v", "2"])
            .arg(&out_path)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => paths.push(out_path),
            Ok(status) => {
                warn!(code = ?status.code(), "ffmpeg exited non-zero while capturing a screenshot");
                return Err(PipelineError::ExternalUnavailable { service: "ffmpeg" });
            }
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                debug!("ffmpeg binary not found; skipping screenshot capture");
                return Ok(Vec::new());
            }
            Err(source) => {
                warn!(%source, "failed to spawn ffmpeg");
                return Err(PipelineError::ExternalUnavailable { service: "ffmpeg" });
            }
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_spread_across_the_duration_without_touching_the_ends() {
        let t0 = timestamp_for(0, 3, 7200);
        let t1 = timestamp_for(1, 3, 7200);
        let t2 = timestamp_for(2, 3, 7200);
        assert!(t0 < t1 && t1 < t2);
        assert!(t2 < 7200);
    }
}
