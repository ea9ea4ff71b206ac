//! Filename tokenizer for the Scan stage: a best-effort split of a release
//! filename into a title guess, year, resolution, source, and release group,
//! the inputs the Analyze stage's TMDB lookup and the Rename stage's
//! release-name computation both depend on.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.\s_\[\(](19\d{2}|20\d{2})[.\s_\]\)]").expect("valid regex"));
static RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(480p|720p|1080p|2160p|4k)\b").expect("valid regex"));
static SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(BluRay|BDRip|BRRip|WEB-?DL|WEBRip|HDTV|DVDRip|REMUX)\b").expect("valid regex"));
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._]+").expect("valid regex"));

/// Tokens extracted from a release filename, persisted under
/// `FileEntry::metadata.scan` so later stages can read them back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilenameTokens {
    /// Best-effort movie title guess, with separators turned back into spaces.
    pub title: String,
    /// Four-digit release year, if one was found.
    pub year: Option<u16>,
    /// Vertical resolution label (`"1080p"`, `"2160p"`, ...), if found.
    pub resolution: Option<String>,
    /// Source label (`"BluRay"`, `"WEB-DL"`, ...), if found.
    pub source: Option<String>,
    /// Release group, taken from the last `-GROUP` suffix, if present.
    pub group: Option<String>,
}

impl FilenameTokens {
    /// Parse tokens out of `path`'s file stem.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let stem = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path)
            .to_string();

        let year = YEAR
            .captures(&format!(".{stem}."))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());

        let resolution = RESOLUTION.find(&stem).map(|m| m.as_str().to_lowercase());
        let source = SOURCE.find(&stem).map(|m| m.as_str().to_string());
        let group = stem.rsplit_once('-').map(|(_, group)| group.to_string()).filter(|g| !g.is_empty());

        let title_span = YEAR
            .find(&format!(".{stem}."))
            .map_or(stem.len(), |m| m.start().saturating_sub(1));
        let title_raw = &stem[..title_span.min(stem.len())];
        let title = SEPARATORS.replace_all(title_raw, " ").trim().to_string();

        Self {
            title,
            year,
            resolution,
            source,
            group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_release_name() {
        let tokens = FilenameTokens::parse("/in/The.Great.Movie.2024.1080p.BluRay.x264-GROUP.mkv");
        assert_eq!(tokens.title, "The Great Movie");
        assert_eq!(tokens.year, Some(2024));
        assert_eq!(tokens.resolution.as_deref(), Some("1080p"));
        assert_eq!(tokens.source.as_deref(), Some("BluRay"));
        assert_eq!(tokens.group.as_deref(), Some("GROUP"));
    }

    #[test]
    fn tolerates_a_filename_with_no_recognizable_tokens() {
        let tokens = FilenameTokens::parse("/in/home_video.mov");
        assert_eq!(tokens.year, None);
        assert_eq!(tokens.resolution, None);
        assert_eq!(tokens.source, None);
        assert!(!tokens.title.is_empty());
    }
}
