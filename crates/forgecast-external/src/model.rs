//! Payload types exchanged with external services.

use serde::{Deserialize, Serialize};

/// Metadata fetched from TMDB for a single movie (spec section 4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieMetadata {
    /// TMDB numeric identifier.
    pub tmdb_id: u64,
    /// Localized title.
    pub title: String,
    /// Original-language title.
    pub original_title: String,
    /// Release year.
    pub year: u16,
    /// Plot synopsis.
    pub overview: String,
    /// Marketing tagline, if any.
    pub tagline: Option<String>,
    /// Genre names.
    pub genres: Vec<String>,
    /// Ordered cast member names.
    pub cast: Vec<String>,
    /// Director name, if known.
    pub director: Option<String>,
    /// Production country codes.
    pub country: Vec<String>,
    /// Runtime in minutes.
    pub runtime_minutes: Option<u32>,
    /// Aggregate rating out of 10.
    pub rating: Option<f64>,
    /// Poster image URL.
    pub poster_url: Option<String>,
    /// Backdrop image URL.
    pub backdrop_url: Option<String>,
}

/// One decoded audio track (spec section 4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// ISO 639 language code, when detected.
    pub language: Option<String>,
    /// Codec name (e.g. `"DTS"`, `"AAC"`).
    pub codec: String,
    /// Channel layout, e.g. `"5.1"`.
    pub channels: String,
}

/// One embedded subtitle track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// ISO 639 language code, when detected.
    pub language: Option<String>,
    /// Subtitle format (e.g. `"SRT"`, `"PGS"`).
    pub format: String,
    /// Whether this is a forced-only track.
    pub forced: bool,
}

/// Technical media characteristics produced by the Analyze stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Vertical resolution label, e.g. `"1080p"`.
    pub resolution: String,
    /// Video codec, e.g. `"HEVC"`.
    pub video_codec: String,
    /// Whether the stream carries HDR metadata.
    pub hdr: bool,
    /// Decoded audio tracks.
    pub audio_tracks: Vec<AudioTrack>,
    /// Embedded subtitle tracks.
    pub subtitles: Vec<SubtitleTrack>,
    /// Duration in seconds.
    pub duration_secs: u64,
    /// File size in bytes.
    pub size_bytes: u64,
}

impl MediaInfo {
    /// Whether both a French and an English audio track were detected,
    /// the trigger for a schema's `auto_multi` option rule (spec section 4.5).
    #[must_use]
    pub fn has_french_and_english_audio(&self) -> bool {
        let has = |code: &str| {
            self.audio_tracks
                .iter()
                .any(|track| track.language.as_deref() == Some(code))
        };
        has("fr") && has("en")
    }
}

/// Session material obtained from a Cloudflare-bypass service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudflareSession {
    /// Cookie header value to replay on subsequent requests.
    pub cookies: String,
    /// User-Agent string the bypass session was solved under; subsequent
    /// requests must replay it verbatim or the cookies are rejected.
    pub user_agent: String,
}

/// Request to author a new `.torrent` metainfo file (spec section 4.6,
/// Generate stage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentAuthorRequest {
    /// Local filesystem path of the file to hash.
    pub root_path: String,
    /// Announce URL(s) to embed.
    pub trackers: Vec<String>,
    /// Explicit piece length in bytes; if `None`, chosen from a size table.
    pub piece_length: Option<u32>,
    /// Private-tracker flag.
    pub private: bool,
    /// Free-text comment embedded in the metainfo.
    pub comment: Option<String>,
    /// Per-tracker `source` tag, used by private trackers to detect
    /// cross-posted torrents.
    pub source: Option<String>,
}

/// Status of a torrent already admitted into the seeding client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentStatus {
    /// Info-hash, hex-encoded.
    pub info_hash: String,
    /// Whether the client reports the torrent as seeding.
    pub seeding: bool,
    /// Upload ratio, when the client reports one.
    pub ratio: Option<f64>,
}
