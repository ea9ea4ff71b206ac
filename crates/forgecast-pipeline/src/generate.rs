//! Generate stage (spec section 4.6): author one `.torrent` per enabled
//! tracker and render the NFO/BBCode presentation text.

use forgecast_domain::{FileEntry, PipelineError, PipelineResult};
use forgecast_external::{MediaInfo, MovieMetadata, TorrentAuthorRequest};
use serde_json::json;

use crate::merge::merge_top_level;
use crate::services::ExternalServices;

pub(crate) async fn run(entry: &mut FileEntry, services: &ExternalServices) -> PipelineResult<()> {
    let movie: MovieMetadata = deserialize_section(entry, "tmdb")?;
    let media: MediaInfo = deserialize_section(entry, "media")?;

    for (slug, handle) in &services.trackers {
        if !handle.enabled {
            continue;
        }
        let request = TorrentAuthorRequest {
            root_path: entry.file_path.clone(),
            trackers: Vec::new(),
            piece_length: None,
            private: true,
            comment: entry.release_name.clone(),
            source: Some(slug.clone()),
        };
        let torrent_bytes = services.torrent.create_torrent(&request).await?;
        let torrent_path = format!("{}/torrents/{slug}/{}.torrent", services.output_dir, entry.release_name.as_deref().unwrap_or("release"));
        write_file(&torrent_path, &torrent_bytes).await?;
        entry.torrent_paths.insert(slug.clone(), torrent_path);
    }

    let nfo_text = services.nfo_renderer.render_nfo(&movie, &media).await?;
    let bbcode_text = services.nfo_renderer.render_bbcode(&movie, &media).await?;
    let nfo_path = format!("{}/nfo/{}.nfo", services.output_dir, entry.release_name.as_deref().unwrap_or("release"));
    write_file(&nfo_path, nfo_text.as_bytes()).await?;
    entry.nfo_path = Some(nfo_path);

    merge_top_level(&mut entry.metadata, json!({ "presentation": { "nfo": nfo_text, "bbcode": bbcode_text } }));
    Ok(())
}

fn deserialize_section<T: serde::de::DeserializeOwned>(entry: &FileEntry, section: &'static str) -> PipelineResult<T> {
    entry
        .metadata
        .get(section)
        .cloned()
        .ok_or_else(|| PipelineError::InternalInvariant {
            detail: format!("missing '{section}' metadata section before the Generate stage"),
        })
        .and_then(|value| {
            serde_json::from_value(value).map_err(|source| PipelineError::InternalInvariant {
                detail: format!("corrupt '{section}' metadata: {source}"),
            })
        })
}

async fn write_file(path: &str, bytes: &[u8]) -> PipelineResult<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| PipelineError::ValidationError {
            field: "output_dir".to_string(),
            reason: format!("failed to create directory for {path}: {source}"),
        })?;
    }
    tokio::fs::write(path, bytes).await.map_err(|source| PipelineError::ValidationError {
        field: "output_dir".to_string(),
        reason: format!("failed to write {path}: {source}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_top_level;
    use crate::test_support::{sample_media, sample_movie, stub_services};
    use serde_json::json;

    #[tokio::test]
    async fn generate_renders_nfo_even_with_no_enabled_trackers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut entry = FileEntry::new(dir.path().join("release.mkv").to_string_lossy().into_owned());
        entry.release_name = Some("Example.Movie.2024.1080p.BluRay.HEVC-GROUP".to_string());
        merge_top_level(
            &mut entry.metadata,
            json!({ "tmdb": sample_movie(42), "media": sample_media() }),
        );
        let services = stub_services(dir.path());

        run(&mut entry, &services).await.unwrap();

        assert!(entry.nfo_path.is_some());
        assert!(entry.torrent_paths.is_empty());
        assert!(entry.metadata["presentation"]["bbcode"].as_str().unwrap().contains("[b]"));
    }
}
