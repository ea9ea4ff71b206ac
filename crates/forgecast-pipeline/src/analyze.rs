//! Analyze stage (spec section 4.6): run MediaInfo over the source file and
//! resolve its TMDB metadata, cache-first, using the Scan stage's title/year
//! guess.

use forgecast_domain::{FileEntry, PipelineError, PipelineResult};
use serde_json::json;

use crate::merge::merge_top_level;
use crate::services::ExternalServices;
use crate::tokens::FilenameTokens;

pub(crate) async fn run(entry: &mut FileEntry, services: &ExternalServices) -> PipelineResult<()> {
    let media = services.media_info.analyze(&entry.file_path).await?;

    let scan_tokens: FilenameTokens = entry
        .metadata
        .get("scan")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();

    let Some(tmdb_id) = services.metadata.search_movie(&scan_tokens.title, scan_tokens.year).await? else {
        return Err(PipelineError::ValidationError {
            field: "scan.title".to_string(),
            reason: format!("no TMDB match for '{}' ({:?})", scan_tokens.title, scan_tokens.year),
        });
    };
    let movie = services.metadata.get_movie(tmdb_id).await?;

    merge_top_level(&mut entry.metadata, json!({ "media": media, "tmdb": movie }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stub_services;
    use serde_json::json;

    #[tokio::test]
    async fn analyze_merges_media_and_tmdb_sections() {
        let mut entry = FileEntry::new("/in/movie.mkv");
        merge_top_level(&mut entry.metadata, json!({"scan": {"title": "Example Movie", "year": 2024}}));
        let dir = std::env::temp_dir();
        let services = stub_services(&dir);

        run(&mut entry, &services).await.unwrap();

        assert_eq!(entry.metadata["media"]["resolution"], "1080p");
        assert_eq!(entry.metadata["tmdb"]["title"], "Example Movie");
        assert_eq!(entry.metadata["tmdb"]["tmdb_id"], 42);
    }
}
