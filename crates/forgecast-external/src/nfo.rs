//! Thin NFO/BBCode renderer. Template rendering for presentations is an
//! out-of-scope external collaborator (spec section 1); this default
//! implementation covers only the fields the Generate stage gathers, with
//! no external templating dependency.

use async_trait::async_trait;
use forgecast_domain::PipelineResult;

use crate::model::MediaInfo;
use crate::model::MovieMetadata;

/// Renders a release's gathered metadata into presentation text.
#[async_trait]
pub trait NfoRenderer: Send + Sync {
    /// Render a plain-text NFO body.
    async fn render_nfo(&self, movie: &MovieMetadata, media: &MediaInfo) -> PipelineResult<String>;

    /// Render a BBCode description suitable for a tracker upload field.
    async fn render_bbcode(&self, movie: &MovieMetadata, media: &MediaInfo) -> PipelineResult<String>;
}

/// Plain-text, no-external-dependency implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextRenderer;

#[async_trait]
impl NfoRenderer for PlainTextRenderer {
    async fn render_nfo(&self, movie: &MovieMetadata, media: &MediaInfo) -> PipelineResult<String> {
        Ok(format!(
            "{title} ({year})\n\n{overview}\n\nGenres: {genres}\nDirector: {director}\nRuntime: {runtime} min\n\nVideo: {resolution} {video_codec}{hdr}\nAudio: {audio_tracks}\nSubtitles: {subtitles}\n",
            title = movie.title,
            year = movie.year,
            overview = movie.overview,
            genres = movie.genres.join(", "),
            director = movie.director.as_deref().unwrap_or("unknown"),
            runtime = movie.runtime_minutes.unwrap_or(0),
            resolution = media.resolution,
            video_codec = media.video_codec,
            hdr = if media.hdr { " HDR" } else { "" },
            audio_tracks = media
                .audio_tracks
                .iter()
                .map(|track| format!("{} ({})", track.codec, track.channels))
                .collect::<Vec<_>>()
                .join(", "),
            subtitles = media
                .subtitles
                .iter()
                .map(|sub| sub.format.clone())
                .collect::<Vec<_>>()
                .join(", "),
        ))
    }

    async fn render_bbcode(&self, movie: &MovieMetadata, media: &MediaInfo) -> PipelineResult<String> {
        Ok(format!(
            "[b]{title}[/b] ({year})\n\n[i]{tagline}[/i]\n\n{overview}\n\n[b]Video:[/b] {resolution} {video_codec}\n[b]Audio:[/b] {audio_count} track(s)\n",
            title = movie.title,
            year = movie.year,
            tagline = movie.tagline.as_deref().unwrap_or(""),
            overview = movie.overview,
            resolution = media.resolution,
            video_codec = media.video_codec,
            audio_count = media.audio_tracks.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_movie() -> MovieMetadata {
        MovieMetadata {
            tmdb_id: 1,
            title: "Example".to_string(),
            original_title: "Example".to_string(),
            year: 2024,
            overview: "A story.".to_string(),
            tagline: Some("Tag.".to_string()),
            genres: vec!["Drama".to_string()],
            cast: vec![],
            director: Some("Someone".to_string()),
            country: vec![],
            runtime_minutes: Some(120),
            rating: Some(7.5),
            poster_url: None,
            backdrop_url: None,
        }
    }

    fn sample_media() -> MediaInfo {
        MediaInfo {
            resolution: "1080p".to_string(),
            video_codec: "HEVC".to_string(),
            hdr: false,
            audio_tracks: vec![],
            subtitles: vec![],
            duration_secs: 7200,
            size_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn nfo_includes_title_and_year() {
        let renderer = PlainTextRenderer;
        let nfo = renderer.render_nfo(&sample_movie(), &sample_media()).await.unwrap();
        assert!(nfo.contains("Example (2024)"));
    }

    #[tokio::test]
    async fn bbcode_wraps_title_in_bold_tags() {
        let renderer = PlainTextRenderer;
        let bbcode = renderer.render_bbcode(&sample_movie(), &sample_media()).await.unwrap();
        assert!(bbcode.contains("[b]Example[/b]"));
    }
}
