//! Contracts the core consumes (spec section 4.4). Each trait is
//! implemented once by a thin `reqwest`-backed default client in this crate;
//! the pipeline depends on the trait object, never the concrete type.

use async_trait::async_trait;
use forgecast_domain::PipelineResult;

use crate::model::{CloudflareSession, MediaInfo, MovieMetadata, TorrentAuthorRequest, TorrentStatus};

/// Fetches movie metadata, with cache-then-network semantics owned by the
/// caller (see [`crate::tmdb::TmdbClient::get_movie`] for the reference
/// implementation, which layers a `TmdbCacheStore` in front of the network).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch metadata for a single TMDB movie id.
    async fn get_movie(&self, tmdb_id: u64) -> PipelineResult<MovieMetadata>;

    /// Resolve a `(title, year)` guess (as produced by the Scan stage's
    /// filename tokenizer) to a TMDB id, the first step of the Analyze
    /// stage's "fetch TMDB using title/year" action. Returns `None` when no
    /// confident match is found, rather than erroring — callers decide how
    /// to handle an unresolved title.
    async fn search_movie(&self, title: &str, year: Option<u16>) -> PipelineResult<Option<u64>>;
}

/// Analyzes a media file's technical characteristics.
#[async_trait]
pub trait MediaInfoProvider: Send + Sync {
    /// Analyze the file at `path`.
    async fn analyze(&self, path: &str) -> PipelineResult<MediaInfo>;
}

/// Obtains a browser-equivalent session for trackers fronted by Cloudflare.
#[async_trait]
pub trait CloudflareBypassClient: Send + Sync {
    /// Solve the challenge at `url` and return replayable session material.
    async fn get_session(&self, url: &str) -> PipelineResult<CloudflareSession>;
}

/// Authors `.torrent` files and reports on ones already admitted for
/// seeding.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Author a new `.torrent` metainfo payload; returns the encoded bytes.
    async fn create_torrent(&self, request: &TorrentAuthorRequest) -> PipelineResult<Vec<u8>>;

    /// Admit a torrent into the seeding client.
    async fn add_torrent(&self, torrent_bytes: &[u8], category: Option<&str>) -> PipelineResult<()>;

    /// Report on a torrent already admitted, keyed by its info-hash.
    async fn get_status(&self, info_hash: &str) -> PipelineResult<TorrentStatus>;
}

/// Uploads screenshot bytes to an image host and returns a public URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload `bytes` and return the hosted URL.
    async fn upload(&self, bytes: Vec<u8>) -> PipelineResult<String>;
}
