//! Parses a tracker's search/duplicate-check response into a uniform result
//! list, per the `search.format` declared in its schema.

use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{SearchFormat, SearchSpec};

/// One row of a search/duplicate-check result, uniform across response
/// formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Release title as reported by the tracker.
    pub title: String,
    /// Tracker-side identifier, if the schema declares an `id_path`.
    pub id: Option<String>,
}

/// Parse a response body into a list of [`SearchResult`]s per `spec.format`.
///
/// # Errors
///
/// Returns [`SchemaError::Malformed`] if the body cannot be parsed as the
/// declared format, or if `results_path` is required but absent.
pub fn parse_response(spec: &SearchSpec, body: &str) -> SchemaResult<Vec<SearchResult>> {
    match spec.format {
        SearchFormat::Json => parse_json(spec, body),
        SearchFormat::Torznab => parse_torznab(body),
    }
}

fn parse_json(spec: &SearchSpec, body: &str) -> SchemaResult<Vec<SearchResult>> {
    let document: Value = serde_json::from_str(body).map_err(|source| SchemaError::Malformed {
        reason: format!("search response is not valid JSON: {source}"),
    })?;

    let results_path = spec.results_path.as_deref().ok_or_else(|| SchemaError::Malformed {
        reason: "json search format requires results_path".to_string(),
    })?;

    let items = results_path
        .split('.')
        .try_fold(&document, |current, segment| current.get(segment))
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaError::Malformed {
            reason: format!("no array found at results_path '{results_path}'"),
        })?;

    items
        .iter()
        .map(|item| {
            let title = item
                .get(&spec.title_path)
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaError::Malformed {
                    reason: format!("search result missing title at '{}'", spec.title_path),
                })?
                .to_string();
            let id = spec
                .id_path
                .as_deref()
                .and_then(|path| item.get(path))
                .and_then(Value::as_str)
                .map(str::to_string);
            Ok(SearchResult { title, id })
        })
        .collect()
}

fn parse_torznab(body: &str) -> SchemaResult<Vec<SearchResult>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut results = Vec::new();
    let mut in_item = false;
    let mut in_title = false;
    let mut current_title: Option<String> = None;
    let mut current_guid: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|source| SchemaError::Malformed {
            reason: format!("search response is not valid Torznab XML: {source}"),
        })? {
            XmlEvent::Start(tag) if tag.name().as_ref() == b"item" => {
                in_item = true;
                current_title = None;
                current_guid = None;
            }
            XmlEvent::Start(tag) if in_item && tag.name().as_ref() == b"title" => in_title = true,
            XmlEvent::Start(tag) if in_item && tag.name().as_ref() == b"guid" => in_title = false,
            XmlEvent::Text(text) if in_item && in_title => {
                current_title = Some(text.unescape().unwrap_or_default().into_owned());
            }
            XmlEvent::Text(text) if in_item && !in_title => {
                if current_guid.is_none() {
                    let candidate = text.unescape().unwrap_or_default().into_owned();
                    if !candidate.trim().is_empty() {
                        current_guid = Some(candidate);
                    }
                }
            }
            XmlEvent::End(tag) if tag.name().as_ref() == b"title" => in_title = false,
            XmlEvent::End(tag) if tag.name().as_ref() == b"item" => {
                in_item = false;
                if let Some(title) = current_title.take() {
                    results.push(SearchResult {
                        title,
                        id: current_guid.take(),
                    });
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_json_search_response() {
        let spec = SearchSpec {
            format: SearchFormat::Json,
            results_path: Some("data.results".to_string()),
            title_path: "title".to_string(),
            id_path: Some("id".to_string()),
        };
        let body = r#"{"data": {"results": [{"title": "Movie.2024.1080p", "id": "42"}]}}"#;
        let results = parse_response(&spec, body).unwrap();
        assert_eq!(results, vec![SearchResult { title: "Movie.2024.1080p".to_string(), id: Some("42".to_string()) }]);
    }

    #[test]
    fn parses_a_torznab_feed() {
        let spec = SearchSpec {
            format: SearchFormat::Torznab,
            results_path: None,
            title_path: "title".to_string(),
            id_path: None,
        };
        let body = r#"<?xml version="1.0"?>
<rss><channel>
  <item><title>Movie.2024.1080p</title><guid>abc123</guid></item>
  <item><title>Movie.2024.2160p</title><guid>def456</guid></item>
</channel></rss>"#;
        let results = parse_response(&spec, body).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Movie.2024.1080p");
        assert_eq!(results[0].id.as_deref(), Some("abc123"));
    }

    #[test]
    fn rejects_missing_results_path() {
        let spec = SearchSpec {
            format: SearchFormat::Json,
            results_path: Some("nowhere".to_string()),
            title_path: "title".to_string(),
            id_path: None,
        };
        assert!(parse_response(&spec, r#"{"data": {}}"#).is_err());
    }
}
