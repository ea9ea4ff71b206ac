//! Resolves a schema's `options` table: mapping a semantic value (a media
//! resolution, a TMDB genre id, a free-form name) onto the vocabulary one
//! tracker's upload form expects.

use serde_json::Value;

use crate::context::BuildContext;
use crate::error::{SchemaError, SchemaResult};
use crate::schema::OptionSpec;

/// Resolve one option field's tracker-side value.
///
/// `semantic_source` is the dotted path the option's semantic value comes
/// from (typically the owning [`crate::schema::FieldDescriptor::source`]).
/// Lookup order: [`OptionSpec::mappings`] by the value's string form, then
/// [`OptionSpec::tmdb_mappings`] when `semantic_source` starts with `"tmdb."`,
/// then [`OptionSpec::name_mappings`], then [`OptionSpec::default`].
///
/// # Errors
///
/// Returns [`SchemaError::UnmappedOptionValue`] if no table and no default
/// resolves the value.
pub fn resolve(
    option_name: &str,
    spec: &OptionSpec,
    ctx: &BuildContext,
    semantic_source: &str,
) -> SchemaResult<Value> {
    let Some(raw) = ctx.resolve(semantic_source) else {
        return spec.default.clone().ok_or_else(|| SchemaError::UnmappedOptionValue {
            option: option_name.to_string(),
            value: "<missing>".to_string(),
        });
    };

    if spec.multi_select {
        if let Value::Array(items) = raw {
            let mut mapped = Vec::with_capacity(items.len());
            for item in items {
                let key = scalar_key(item);
                mapped.push(lookup(spec, semantic_source, &key).ok_or_else(|| {
                    SchemaError::UnmappedOptionValue {
                        option: option_name.to_string(),
                        value: key.clone(),
                    }
                })?);
            }
            return Ok(Value::Array(mapped));
        }
    }

    let key = scalar_key(raw);
    lookup(spec, semantic_source, &key).ok_or_else(|| SchemaError::UnmappedOptionValue {
        option: option_name.to_string(),
        value: key,
    })
}

fn scalar_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn lookup(spec: &OptionSpec, semantic_source: &str, key: &str) -> Option<Value> {
    if semantic_source.starts_with("tmdb.") {
        if let Some(value) = spec.tmdb_mappings.get(key) {
            return Some(value.clone());
        }
    }
    spec.mappings
        .get(key)
        .or_else(|| spec.name_mappings.get(key))
        .cloned()
        .or_else(|| spec.default.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> OptionSpec {
        OptionSpec {
            field: "resolution_id".to_string(),
            mappings: [("1080p".to_string(), json!(3))].into_iter().collect(),
            tmdb_mappings: [("28".to_string(), json!("action"))].into_iter().collect(),
            name_mappings: std::collections::BTreeMap::new(),
            multi_select: false,
            default: Some(json!(0)),
        }
    }

    #[test]
    fn resolves_a_direct_mapping() {
        let ctx = BuildContext::new(json!({"media": {"resolution": "1080p"}}));
        let value = resolve("resolution", &spec(), &ctx, "media.resolution").unwrap();
        assert_eq!(value, json!(3));
    }

    #[test]
    fn resolves_a_tmdb_mapping() {
        let ctx = BuildContext::new(json!({"tmdb": {"genre_id": "28"}}));
        let value = resolve("genre", &spec(), &ctx, "tmdb.genre_id").unwrap();
        assert_eq!(value, json!("action"));
    }

    #[test]
    fn falls_back_to_default_on_unknown_value() {
        let ctx = BuildContext::new(json!({"media": {"resolution": "4k"}}));
        let value = resolve("resolution", &spec(), &ctx, "media.resolution").unwrap();
        assert_eq!(value, json!(0));
    }

    #[test]
    fn errors_when_no_default_and_no_mapping() {
        let mut no_default = spec();
        no_default.default = None;
        let ctx = BuildContext::new(json!({"media": {"resolution": "4k"}}));
        assert!(resolve("resolution", &no_default, &ctx, "media.resolution").is_err());
    }

    #[test]
    fn resolves_multi_select_arrays() {
        let mut multi = spec();
        multi.multi_select = true;
        let ctx = BuildContext::new(json!({"media": {"resolution": ["1080p"]}}));
        let value = resolve("resolution", &multi, &ctx, "media.resolution").unwrap();
        assert_eq!(value, json!([3]));
    }
}
