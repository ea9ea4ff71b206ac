//! Structural validation applied after a [`CoreConfig`] is deserialized.

use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult};
use crate::model::CoreConfig;

/// Validate required fields and cross-field invariants.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] or [`ConfigError::DuplicateTrackerSlug`]
/// when the document is structurally unsound.
pub fn validate(config: &CoreConfig) -> ConfigResult<()> {
    require_non_empty(&config.database_url, "database_url")?;
    require_non_empty(&config.input_media_path, "input_media_path")?;
    require_non_empty(&config.output_dir, "output_dir")?;

    if config.worker_concurrency == 0 {
        return Err(ConfigError::Invalid {
            field: "worker_concurrency",
            reason: "must be at least 1".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for tracker in &config.trackers {
        require_non_empty(&tracker.slug, "trackers[].slug")?;
        if !seen.insert(tracker.slug.clone()) {
            return Err(ConfigError::DuplicateTrackerSlug {
                slug: tracker.slug.clone(),
            });
        }
    }

    Ok(())
}

fn require_non_empty(value: &str, field: &'static str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackerEntry;

    fn base_config() -> CoreConfig {
        CoreConfig {
            database_url: "postgres://localhost/forgecast".to_string(),
            input_media_path: "/in".to_string(),
            output_dir: "/out".to_string(),
            ..CoreConfig::default()
        }
    }

    #[test]
    fn accepts_a_well_formed_config() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn rejects_zero_worker_concurrency() {
        let mut config = base_config();
        config.worker_concurrency = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_duplicate_slugs() {
        let mut config = base_config();
        let entry = TrackerEntry {
            slug: "demo".to_string(),
            enabled: true,
            credentials: crate::model::TrackerCredentials::default(),
            schema_path: "demo.yaml".into(),
            schema: serde_yaml::Value::Null,
            skip_on_duplicate: true,
        };
        config.trackers.push(entry.clone());
        config.trackers.push(entry);
        assert!(matches!(
            validate(&config),
            Err(ConfigError::DuplicateTrackerSlug { .. })
        ));
    }
}
