//! Lightweight fakes for the component-D contracts, used only by this
//! crate's own stage tests so they exercise real stage logic without a
//! network.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use forgecast_config::PolicySettings;
use forgecast_domain::PipelineResult;
use forgecast_external::{
    AudioTrack, ImageHost, MediaInfo, MediaInfoProvider, MetadataProvider, MovieMetadata, PlainTextRenderer,
    TorrentAuthorRequest, TorrentClient, TorrentStatus,
};

use crate::services::ExternalServices;

pub(crate) struct StubMetadataProvider;

#[async_trait]
impl MetadataProvider for StubMetadataProvider {
    async fn get_movie(&self, tmdb_id: u64) -> PipelineResult<MovieMetadata> {
        Ok(sample_movie(tmdb_id))
    }

    async fn search_movie(&self, _title: &str, _year: Option<u16>) -> PipelineResult<Option<u64>> {
        Ok(Some(42))
    }
}

pub(crate) fn sample_movie(tmdb_id: u64) -> MovieMetadata {
    MovieMetadata {
        tmdb_id,
        title: "Example Movie".to_string(),
        original_title: "Example Movie".to_string(),
        year: 2024,
        overview: "A story.".to_string(),
        tagline: Some("Tag.".to_string()),
        genres: vec!["Drama".to_string()],
        cast: vec!["Lead Actor".to_string()],
        director: Some("Some Director".to_string()),
        country: vec!["US".to_string()],
        runtime_minutes: Some(120),
        rating: Some(7.5),
        poster_url: None,
        backdrop_url: None,
    }
}

pub(crate) struct StubMediaInfoProvider;

#[async_trait]
impl MediaInfoProvider for StubMediaInfoProvider {
    async fn analyze(&self, _path: &str) -> PipelineResult<MediaInfo> {
        Ok(sample_media())
    }
}

pub(crate) fn sample_media() -> MediaInfo {
    MediaInfo {
        resolution: "1080p".to_string(),
        video_codec: "HEVC".to_string(),
        hdr: false,
        audio_tracks: vec![AudioTrack {
            language: Some("en".to_string()),
            codec: "DTS".to_string(),
            channels: "5.1".to_string(),
        }],
        subtitles: vec![],
        duration_secs: 7200,
        size_bytes: 4_000_000_000,
    }
}

pub(crate) struct StubTorrentClient;

#[async_trait]
impl TorrentClient for StubTorrentClient {
    async fn create_torrent(&self, _request: &TorrentAuthorRequest) -> PipelineResult<Vec<u8>> {
        Ok(b"d4:spam4:eggse".to_vec())
    }

    async fn add_torrent(&self, _torrent_bytes: &[u8], _category: Option<&str>) -> PipelineResult<()> {
        Ok(())
    }

    async fn get_status(&self, info_hash: &str) -> PipelineResult<TorrentStatus> {
        Ok(TorrentStatus {
            info_hash: info_hash.to_string(),
            seeding: true,
            ratio: Some(1.0),
        })
    }
}

pub(crate) struct StubImageHost;

#[async_trait]
impl ImageHost for StubImageHost {
    async fn upload(&self, _bytes: Vec<u8>) -> PipelineResult<String> {
        Ok("https://images.example/shot.jpg".to_string())
    }
}

/// Build an `ExternalServices` bundle with no trackers configured, backed by
/// a temp directory for `output_dir`. Individual tests add trackers or swap
/// collaborators as needed.
pub(crate) fn stub_services(output_dir: &std::path::Path) -> ExternalServices {
    ExternalServices {
        metadata: Arc::new(StubMetadataProvider),
        media_info: Arc::new(StubMediaInfoProvider),
        cloudflare: None,
        torrent: Arc::new(StubTorrentClient),
        image_host: Arc::new(StubImageHost),
        nfo_renderer: Arc::new(PlainTextRenderer),
        trackers: BTreeMap::new(),
        output_dir: output_dir.to_string_lossy().into_owned(),
        policy: PolicySettings::default(),
    }
}
