//! Rename stage (spec section 4.6): compute the canonical release name and
//! move the source file into the output directory under that name.

use std::path::Path;

use forgecast_domain::{FileEntry, PipelineError, PipelineResult};

use crate::services::ExternalServices;
use crate::tokens::FilenameTokens;

/// Build `Title.Year.Resolution.Source.Codec-GROUP` from the Scan stage's
/// filename tokens plus the Analyze stage's detected video codec.
fn compute_release_name(tokens: &FilenameTokens, video_codec: &str) -> String {
    let title = tokens.title.replace(' ', ".");
    let year = tokens.year.map_or_else(|| "0000".to_string(), |year| year.to_string());
    let resolution = tokens.resolution.clone().unwrap_or_else(|| "SD".to_string());
    let source = tokens.source.clone().unwrap_or_else(|| "UNKNOWN".to_string());
    let group = tokens.group.clone().unwrap_or_else(|| "NOGROUP".to_string());

    format!("{title}.{year}.{resolution}.{source}.{video_codec}-{group}")
}

pub(crate) async fn run(entry: &mut FileEntry, services: &ExternalServices) -> PipelineResult<()> {
    let scan_tokens: FilenameTokens = entry
        .metadata
        .get("scan")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();
    let video_codec = entry
        .metadata
        .get("media")
        .and_then(|media| media.get("video_codec"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("UNKNOWN");

    let release_name = compute_release_name(&scan_tokens, video_codec);
    let extension = Path::new(&entry.file_path).extension().and_then(|ext| ext.to_str()).unwrap_or("mkv");
    let target_path = format!("{}/{release_name}.{extension}", services.output_dir);

    tokio::fs::create_dir_all(&services.output_dir)
        .await
        .map_err(|source| PipelineError::ValidationError {
            field: "output_dir".to_string(),
            reason: format!("failed to create output directory: {source}"),
        })?;

    if tokio::fs::metadata(&target_path).await.is_err() {
        tokio::fs::rename(&entry.file_path, &target_path).await.map_err(|source| PipelineError::ValidationError {
            field: "file_path".to_string(),
            reason: format!("failed to move file to {target_path}: {source}"),
        })?;
    }

    entry.release_name = Some(release_name);
    entry.file_path = target_path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_top_level;
    use crate::test_support::stub_services;
    use serde_json::json;

    #[test]
    fn computes_the_canonical_release_name() {
        let tokens = FilenameTokens {
            title: "The Great Movie".to_string(),
            year: Some(2024),
            resolution: Some("1080p".to_string()),
            source: Some("BluRay".to_string()),
            group: Some("GROUP".to_string()),
        };
        assert_eq!(compute_release_name(&tokens, "HEVC"), "The.Great.Movie.2024.1080p.BluRay.HEVC-GROUP");
    }

    #[tokio::test]
    async fn rename_moves_the_file_and_records_the_release_name() {
        let src_dir = tempfile::tempdir().expect("tempdir");
        let out_dir = tempfile::tempdir().expect("tempdir");
        let src_path = src_dir.path().join("source.mkv");
        tokio::fs::write(&src_path, b"fake bytes").await.unwrap();

        let mut entry = FileEntry::new(src_path.to_string_lossy().into_owned());
        merge_top_level(
            &mut entry.metadata,
            json!({"scan": {"title": "Example Movie", "year": 2024, "resolution": "1080p", "source": "BluRay", "group": "GROUP"}, "media": {"video_codec": "HEVC"}}),
        );
        let services = stub_services(out_dir.path());

        run(&mut entry, &services).await.unwrap();

        assert_eq!(entry.release_name.as_deref(), Some("Example.Movie.2024.1080p.BluRay.HEVC-GROUP"));
        assert!(tokio::fs::metadata(&entry.file_path).await.is_ok());
        assert!(tokio::fs::metadata(&src_path).await.is_err());
    }
}
