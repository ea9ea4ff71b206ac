//! Thin [`MediaInfoProvider`] backed by shelling out to the `mediainfo` CLI
//! tool and parsing its JSON report. Depth of MediaInfo parsing is
//! intentionally shallow (spec section 4.4): only the fields the pipeline
//! consumes are extracted.

use async_trait::async_trait;
use forgecast_domain::{PipelineError, PipelineResult};
use serde::Deserialize;
use tokio::process::Command;
use tracing::warn;

use crate::model::{AudioTrack, MediaInfo, SubtitleTrack};
use crate::traits::MediaInfoProvider;

/// Invokes `mediainfo --Output=JSON <path>` and maps its report onto
/// [`MediaInfo`].
pub struct CliMediaInfoProvider {
    binary: String,
}

impl CliMediaInfoProvider {
    /// Construct a provider invoking `mediainfo` found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: "mediainfo".to_string(),
        }
    }

    /// Construct a provider invoking an explicit binary path, for
    /// deployments where `mediainfo` is not on `PATH`.
    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for CliMediaInfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaInfoProvider for CliMediaInfoProvider {
    async fn analyze(&self, path: &str) -> PipelineResult<MediaInfo> {
        let output = Command::new(&self.binary).arg("--Output=JSON").arg(path).output().await.map_err(|source| {
            warn!(path, %source, "mediainfo binary not found or failed to spawn");
            PipelineError::ExternalUnavailable { service: "mediainfo" }
        })?;

        if !output.status.success() {
            return Err(PipelineError::ExternalUnavailable { service: "mediainfo" });
        }

        let report: MediaInfoReport = serde_json::from_slice(&output.stdout).map_err(|source| PipelineError::InternalInvariant {
            detail: format!("unparsable mediainfo report: {source}"),
        })?;
        Ok(report.into_media_info())
    }
}

#[derive(Deserialize)]
struct MediaInfoReport {
    media: MediaInfoMedia,
}

#[derive(Deserialize)]
struct MediaInfoMedia {
    track: Vec<MediaInfoTrack>,
}

#[derive(Deserialize, Default)]
struct MediaInfoTrack {
    #[serde(rename = "@type")]
    track_type: String,
    #[serde(default)]
    width: Option<String>,
    #[serde(default)]
    #[serde(rename = "Format")]
    format: Option<String>,
    #[serde(default)]
    #[serde(rename = "HDR_Format")]
    hdr_format: Option<String>,
    #[serde(default)]
    #[serde(rename = "Language")]
    language: Option<String>,
    #[serde(default)]
    #[serde(rename = "Channels")]
    channels: Option<String>,
    #[serde(default)]
    #[serde(rename = "Duration")]
    duration: Option<String>,
    #[serde(default)]
    #[serde(rename = "FileSize")]
    file_size: Option<String>,
    #[serde(default)]
    #[serde(rename = "Forced")]
    forced: Option<String>,
}

impl MediaInfoReport {
    fn into_media_info(self) -> MediaInfo {
        let mut resolution = String::new();
        let mut video_codec = String::new();
        let mut hdr = false;
        let mut duration_secs = 0u64;
        let mut size_bytes = 0u64;
        let mut audio_tracks = Vec::new();
        let mut subtitles = Vec::new();

        for track in self.media.track {
            match track.track_type.as_str() {
                "General" => {
                    duration_secs = track.duration.as_deref().and_then(parse_seconds).unwrap_or(0);
                    size_bytes = track.file_size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0);
                }
                "Video" => {
                    resolution = track
                        .width
                        .as_deref()
                        .and_then(|w| w.parse::<u32>().ok())
                        .map_or_else(String::new, height_label_from_width);
                    video_codec = track.format.unwrap_or_default();
                    hdr = track.hdr_format.is_some();
                }
                "Audio" => audio_tracks.push(AudioTrack {
                    language: track.language,
                    codec: track.format.unwrap_or_default(),
                    channels: track.channels.unwrap_or_default(),
                }),
                "Text" => subtitles.push(SubtitleTrack {
                    language: track.language,
                    format: track.format.unwrap_or_default(),
                    forced: track.forced.as_deref() == Some("Yes"),
                }),
                _ => {}
            }
        }

        MediaInfo {
            resolution,
            video_codec,
            hdr,
            audio_tracks,
            subtitles,
            duration_secs,
            size_bytes,
        }
    }
}

fn parse_seconds(raw: &str) -> Option<u64> {
    raw.parse::<f64>().ok().map(|secs| secs.round() as u64)
}

fn height_label_from_width(width: u32) -> String {
    match width {
        w if w >= 3800 => "2160p".to_string(),
        w if w >= 1900 => "1080p".to_string(),
        w if w >= 1260 => "720p".to_string(),
        w if w >= 700 => "480p".to_string(),
        _ => "SD".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_is_mapped_to_the_nearest_resolution_label() {
        assert_eq!(height_label_from_width(3840), "2160p");
        assert_eq!(height_label_from_width(1920), "1080p");
        assert_eq!(height_label_from_width(1280), "720p");
        assert_eq!(height_label_from_width(640), "SD");
    }

    #[test]
    fn duration_string_parses_to_rounded_seconds() {
        assert_eq!(parse_seconds("7215.123"), Some(7215));
    }
}
