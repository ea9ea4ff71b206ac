//! Scan stage (spec section 4.6): verify the source file exists and is
//! readable, then parse its filename into tokens the later stages consume.

use forgecast_domain::{FileEntry, PipelineError, PipelineResult};
use serde_json::json;
use tracing::debug;

use crate::merge::merge_top_level;
use crate::services::ExternalServices;
use crate::tokens::FilenameTokens;

pub(crate) async fn run(entry: &mut FileEntry, _services: &ExternalServices) -> PipelineResult<()> {
    let metadata = tokio::fs::metadata(&entry.file_path)
        .await
        .map_err(|source| PipelineError::ValidationError {
            field: "file_path".to_string(),
            reason: format!("file not readable: {source}"),
        })?;
    if !metadata.is_file() {
        return Err(PipelineError::ValidationError {
            field: "file_path".to_string(),
            reason: "path does not point at a regular file".to_string(),
        });
    }

    let tokens = FilenameTokens::parse(&entry.file_path);
    debug!(file_path = %entry.file_path, title = %tokens.title, year = ?tokens.year, "scanned filename tokens");
    merge_top_level(&mut entry.metadata, json!({ "scan": tokens }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stub_services;

    #[tokio::test]
    async fn scanning_a_missing_file_is_a_validation_error() {
        let mut entry = FileEntry::new("/no/such/file.mkv");
        let services = stub_services(&std::env::temp_dir());
        let err = run(&mut entry, &services).await.unwrap_err();
        assert_eq!(err.kind(), forgecast_domain::ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn scanning_an_existing_file_records_filename_tokens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("The.Great.Movie.2024.1080p.BluRay.x264-GROUP.mkv");
        tokio::fs::write(&path, b"fake media bytes").await.unwrap();

        let mut entry = FileEntry::new(path.to_string_lossy().into_owned());
        let services = stub_services(dir.path());
        run(&mut entry, &services).await.unwrap();

        assert_eq!(entry.metadata["scan"]["title"], "The Great Movie");
        assert_eq!(entry.metadata["scan"]["year"], 2024);
    }
}
