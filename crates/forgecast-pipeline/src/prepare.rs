//! Prepare stage (spec section 4.6): generate screenshots (best-effort) and
//! upload them to the configured image host.

use forgecast_domain::{FileEntry, PipelineResult};
use serde_json::json;

use crate::merge::merge_top_level;
use crate::screenshot;
use crate::services::ExternalServices;

const SCREENSHOT_COUNT: u32 = 3;

pub(crate) async fn run(entry: &mut FileEntry, services: &ExternalServices) -> PipelineResult<()> {
    let duration_secs = entry
        .metadata
        .get("media")
        .and_then(|media| media.get("duration_secs"))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);

    let screenshot_dir = format!("{}/screenshots/{}", services.output_dir, entry.id);
    let frames = screenshot::capture(&entry.file_path, duration_secs, SCREENSHOT_COUNT, &screenshot_dir).await?;

    let mut urls = Vec::with_capacity(frames.len());
    for frame_path in frames {
        let bytes = tokio::fs::read(&frame_path).await.map_err(|source| forgecast_domain::PipelineError::ValidationError {
            field: "screenshot".to_string(),
            reason: format!("failed to read captured frame {frame_path}: {source}"),
        })?;
        urls.push(services.image_host.upload(bytes).await?);
    }

    entry.screenshot_urls = urls.clone();
    merge_top_level(&mut entry.metadata, json!({ "screenshots": urls }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_top_level;
    use crate::test_support::stub_services;
    use serde_json::json;

    #[tokio::test]
    async fn prepare_is_a_no_op_when_ffmpeg_is_unavailable() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        merge_top_level(&mut entry.metadata, json!({"media": {"duration_secs": 7200}}));
        let dir = tempfile::tempdir().expect("tempdir");
        let services = stub_services(dir.path());

        run(&mut entry, &services).await.unwrap();

        assert!(entry.screenshot_urls.is_empty());
    }
}
