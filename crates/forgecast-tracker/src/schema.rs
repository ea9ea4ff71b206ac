//! Typed view over a tracker's declarative schema document (spec section
//! 4.5). Configuration stores this document as an opaque `serde_yaml::Value`
//! blob (see `forgecast_config::TrackerEntry::schema`); [`TrackerSchema`] is
//! what `forgecast-tracker` parses it into before an upload ever runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};

/// Parse a [`TrackerSchema`] out of an opaque YAML document.
///
/// # Errors
///
/// Returns [`SchemaError::Malformed`] if the document does not match the
/// expected shape.
pub fn parse(document: &serde_yaml::Value) -> SchemaResult<TrackerSchema> {
    serde_yaml::from_value(document.clone()).map_err(|source| SchemaError::Malformed {
        reason: source.to_string(),
    })
}

/// Identity and connection details for a tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerIdentity {
    /// Display name.
    pub name: String,
    /// Unique slug, matching `forgecast_config::TrackerEntry::slug`.
    pub slug: String,
    /// Base URL all endpoint paths are resolved against.
    pub base_url: String,
}

/// How a tracker authenticates requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// `Authorization: Bearer <token>` header.
    Bearer,
    /// A single API-key header, named by [`AuthSpec::header`].
    ApiKey,
    /// A passkey embedded in request query parameters.
    Passkey,
    /// Username/password cookie-session authentication.
    Cookie,
}

/// Authentication shape for a tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSpec {
    /// Which authentication mechanism applies.
    #[serde(rename = "type")]
    pub kind: AuthKind,
    /// Header name for [`AuthKind::ApiKey`] or [`AuthKind::Bearer`].
    #[serde(default)]
    pub header: Option<String>,
    /// Value prefix (for example `"Bearer "`) prepended to the credential.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Query parameter name for [`AuthKind::Passkey`].
    #[serde(default)]
    pub passkey_param: Option<String>,
}

/// Cloudflare-bypass requirements for a tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudflareSpec {
    /// Whether requests must be routed through a bypass service first.
    pub enabled: bool,
    /// Name of the bypass service to use (for example `"flaresolverr"`).
    pub service: Option<String>,
}

/// HTTP method for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
}

/// A single named HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// Path appended to `tracker.base_url`, or a fully-qualified URL.
    pub path: String,
    /// HTTP method used to call it.
    #[serde(default = "default_post")]
    pub method: HttpMethod,
}

const fn default_post() -> HttpMethod {
    HttpMethod::Post
}

/// The set of endpoints a tracker exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    /// Optional login/session endpoint, for [`AuthKind::Cookie`].
    #[serde(default)]
    pub authenticate: Option<EndpointSpec>,
    /// Search/duplicate-check endpoint.
    pub search: EndpointSpec,
    /// Upload endpoint.
    pub upload: EndpointSpec,
}

/// How an upload field's value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// The torrent file itself, sent as a multipart file part.
    File,
    /// A plain scalar string value.
    String,
    /// A number, sent as its decimal text form.
    Number,
    /// A boolean, sent as `"true"`/`"false"`.
    Boolean,
    /// A resolved option value (see [`OptionSpec`]).
    Option,
    /// A JSON-serialized scalar or object, sent as one text part.
    Json,
    /// A field repeated once per element of a source array. Tracker APIs
    /// that expect this shape want repeated `multipart` parts sharing one
    /// field name, never a single JSON array value (spec section 4.5).
    Repeated,
}

/// One entry in a tracker's `upload.fields` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Name of the multipart field sent to the tracker.
    pub name: String,
    /// How the value is produced and encoded.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Dotted path resolved against the build context (see
    /// [`crate::context::BuildContext`]).
    #[serde(default)]
    pub source: Option<String>,
    /// Literal default used when `source` resolves to nothing.
    #[serde(default)]
    pub default: Option<Value>,
    /// Whether a missing value (no source match, no default) is an error.
    #[serde(default)]
    pub required: bool,
}

/// One entry in a tracker's `options` table: maps a semantic concept (media
/// resolution, genre, completeness) onto the tracker's own vocabulary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionSpec {
    /// Name of the upload field this option ultimately populates.
    pub field: String,
    /// Direct value-to-value mapping (for example resolution -> category id).
    pub mappings: BTreeMap<String, Value>,
    /// Mapping keyed by a TMDB code (genre id, language code).
    pub tmdb_mappings: BTreeMap<String, Value>,
    /// Mapping keyed by a free-form name match.
    pub name_mappings: BTreeMap<String, Value>,
    /// Whether multiple mapped values may be selected at once.
    pub multi_select: bool,
    /// Value used when no mapping matches and no other fallback applies.
    pub default: Option<Value>,
}

/// Response format for a tracker's search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFormat {
    /// A JSON body.
    Json,
    /// A Torznab-style XML feed.
    Torznab,
}

/// Search endpoint behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpec {
    /// Response body format.
    pub format: SearchFormat,
    /// Dotted path to the results array within a JSON response. Ignored for
    /// [`SearchFormat::Torznab`], which always iterates `<item>` elements.
    #[serde(default)]
    pub results_path: Option<String>,
    /// Dotted path (within one result) to the title field.
    pub title_path: String,
    /// Dotted path (within one result) to a stable identifier, if present.
    #[serde(default)]
    pub id_path: Option<String>,
}

/// How to interpret an upload endpoint's response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseUploadSpec {
    /// Dotted path to a success flag or status code.
    pub success_field: String,
    /// Value `success_field` must equal for the upload to count as accepted.
    pub success_value: Value,
    /// Dotted path to an error message, read when `success_field` mismatches.
    #[serde(default)]
    pub error_field: Option<String>,
}

/// A single validation rule over one upload field's resolved value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldValidation {
    /// Whether the field must resolve to a non-empty value.
    pub required: bool,
    /// Minimum string length, if the value is a string.
    pub min_length: Option<usize>,
    /// Maximum string length, if the value is a string.
    pub max_length: Option<usize>,
    /// Regex the string value must match.
    pub pattern: Option<String>,
}

/// A normalization step applied to a generated string (most commonly the
/// release name) before it is sent to the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SanitizeStep {
    /// Replace every run of whitespace with `with`.
    ReplaceSpaces {
        /// Replacement string.
        with: String,
    },
    /// Remove every match of `pattern`.
    RemovePattern {
        /// Regex pattern to strip.
        pattern: String,
    },
    /// Collapse two or more consecutive dots into one.
    CollapseDots,
    /// Lowercase the entire string.
    Lowercase,
}

/// Hints used to match this schema against a Prowlarr indexer definition
/// (spec section 4.5, `prowlarr` block), kept opaque since Prowlarr
/// compatibility is informational rather than behaviour-affecting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProwlarrHints {
    /// Known Prowlarr indexer definition file names this schema corresponds to.
    pub definition_names: Vec<String>,
}

/// The fully parsed declarative schema for one tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSchema {
    /// Identity and base URL.
    pub tracker: TrackerIdentity,
    /// Authentication shape.
    pub auth: AuthSpec,
    /// Cloudflare bypass requirements.
    #[serde(default)]
    pub cloudflare: CloudflareSpec,
    /// Endpoints this tracker exposes.
    pub endpoints: Endpoints,
    /// Per-action rate-limit overrides, keyed by action name (`"search"`,
    /// `"upload"`).
    #[serde(default)]
    pub rate_limiting: BTreeMap<String, RateLimitEntry>,
    /// Fields sent in the upload request.
    pub upload: UploadSpec,
    /// Semantic-to-tracker-vocabulary option mappings.
    #[serde(default)]
    pub options: BTreeMap<String, OptionSpec>,
    /// Category-name to tracker-category-id mapping.
    #[serde(default)]
    pub categories: BTreeMap<String, Value>,
    /// Search/duplicate-check behaviour.
    pub search: SearchSpec,
    /// How to interpret the upload endpoint's response.
    pub response: ResponseSpec,
    /// Per-field validation rules, keyed by field name.
    #[serde(default)]
    pub validation: BTreeMap<String, FieldValidation>,
    /// Ordered release-name sanitation steps.
    #[serde(default)]
    pub sanitize: Vec<SanitizeStep>,
    /// Optional Prowlarr compatibility hints.
    #[serde(default)]
    pub prowlarr: Option<ProwlarrHints>,
}

/// `upload` section: the field list plus the multipart field carrying the
/// torrent file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSpec {
    /// Ordered field descriptors.
    pub fields: Vec<FieldDescriptor>,
}

/// `response` section wrapper (spec section 4.5's `response.upload`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// Upload response interpretation.
    pub upload: ResponseUploadSpec,
}

/// A rate-limit override expressed in the schema itself (layered under any
/// operator override from `forgecast_config::CoreConfig::rate_limits`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitEntry {
    /// Bucket capacity (burst size).
    pub capacity: f64,
    /// Tokens refilled per second.
    pub refill_rate: f64,
}

impl From<RateLimitEntry> for forgecast_resilience::BucketSpec {
    fn from(value: RateLimitEntry) -> Self {
        Self::new(value.capacity, value.refill_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
tracker:
  name: Demo
  slug: demo
  base_url: https://demo.example
auth:
  type: api_key
  header: X-Api-Key
endpoints:
  search:
    path: /api/search
    method: GET
  upload:
    path: /api/upload
search:
  format: json
  results_path: data.results
  title_path: title
upload:
  fields:
    - name: torrent
      type: file
      required: true
    - name: category
      type: option
      source: media.resolution
response:
  upload:
    success_field: status
    success_value: "ok"
    error_field: message
"#;

    #[test]
    fn parses_a_minimal_schema() {
        let document: serde_yaml::Value = serde_yaml::from_str(DOCUMENT).unwrap();
        let schema = parse(&document).expect("valid schema");
        assert_eq!(schema.tracker.slug, "demo");
        assert_eq!(schema.auth.kind, AuthKind::ApiKey);
        assert_eq!(schema.upload.fields.len(), 2);
        assert_eq!(schema.search.format, SearchFormat::Json);
    }

    #[test]
    fn rejects_a_malformed_document() {
        let document: serde_yaml::Value = serde_yaml::from_str("tracker: 5").unwrap();
        assert!(parse(&document).is_err());
    }
}
