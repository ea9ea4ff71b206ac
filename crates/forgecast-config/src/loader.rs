//! Loads a [`CoreConfig`] from a YAML document.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::model::CoreConfig;
use crate::validate::validate;

/// Parse a [`CoreConfig`] from an in-memory YAML string and validate it.
///
/// Each tracker's `schema` field is left `Null`: resolving `schema_path`
/// needs a base directory, which only [`load_from_path`] has. Callers that
/// go through this function directly (unit tests, embedded configuration)
/// are responsible for populating `schema` themselves if they need it.
///
/// # Errors
///
/// Returns an error if the document is not valid YAML or fails validation.
pub fn load_from_str(document: &str) -> ConfigResult<CoreConfig> {
    let config: CoreConfig =
        serde_yaml::from_str(document).map_err(|source| ConfigError::Parse { source })?;
    validate(&config)?;
    Ok(config)
}

/// Read and parse a [`CoreConfig`] from a YAML file on disk, then load each
/// tracker's schema document independently from `schema_path`, resolved
/// relative to `path`'s parent directory (spec section 10.4).
///
/// # Errors
///
/// Returns an error if the main file or any tracker schema file cannot be
/// read, is not valid YAML, or fails validation.
pub fn load_from_path(path: &Path) -> ConfigResult<CoreConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = load_from_str(&contents)?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    for tracker in &mut config.trackers {
        let schema_path = base_dir.join(&tracker.schema_path);
        let schema_contents = std::fs::read_to_string(&schema_path).map_err(|source| ConfigError::Io {
            path: schema_path,
            source,
        })?;
        tracker.schema =
            serde_yaml::from_str(&schema_contents).map_err(|source| ConfigError::Parse { source })?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r"
database_url: postgres://forgecast@localhost/forgecast
input_media_path: /in
output_dir: /out
worker_concurrency: 2
tmdb_api_key: abc123
trackers:
  - slug: demo
    enabled: true
    credentials:
      api_key: secret
    schema_path: demo.yaml
";

    const DEMO_SCHEMA: &str = r"
tracker:
  name: Demo
  slug: demo
  base_url: https://demo.example
";

    #[test]
    fn loads_minimal_document() {
        let config = load_from_str(MINIMAL).expect("valid config");
        assert_eq!(config.worker_concurrency, 2);
        assert_eq!(config.trackers.len(), 1);
        assert_eq!(config.trackers[0].slug, "demo");
        assert!(config.trackers[0].skip_on_duplicate, "defaults to true");
        assert!(config.trackers[0].schema.is_null(), "load_from_str never resolves schema_path");
    }

    #[test]
    fn rejects_duplicate_tracker_slugs() {
        let document = format!("{MINIMAL}\n  - slug: demo\n    enabled: false\n    credentials: {{}}\n    schema_path: demo.yaml\n");
        let err = load_from_str(&document).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTrackerSlug { .. }));
    }

    #[test]
    fn rejects_missing_database_url() {
        let document = "input_media_path: /in\noutput_dir: /out\n";
        let err = load_from_str(document).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "database_url", .. }));
    }

    #[test]
    fn load_from_path_resolves_schema_relative_to_the_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("forgecast.yaml"), MINIMAL).expect("write config");
        std::fs::write(dir.path().join("demo.yaml"), DEMO_SCHEMA).expect("write schema");

        let config = load_from_path(&dir.path().join("forgecast.yaml")).expect("valid config");
        assert_eq!(config.trackers[0].schema["tracker"]["slug"].as_str(), Some("demo"));
    }

    #[test]
    fn load_from_path_fails_on_missing_schema_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("forgecast.yaml"), MINIMAL).expect("write config");

        let err = load_from_path(&dir.path().join("forgecast.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
