//! Resolves one `upload.fields` descriptor into the value that will become a
//! multipart form part.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::context::BuildContext;
use crate::error::{SchemaError, SchemaResult};
use crate::options;
use crate::schema::{FieldDescriptor, FieldType, OptionSpec};

/// A field's resolved value, ready for multipart encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedField {
    /// A single scalar part.
    Scalar(String),
    /// Several parts sharing one field name (spec section 4.5: tracker APIs
    /// that need a repeated field want distinct multipart parts, never one
    /// JSON array).
    Repeated(Vec<String>),
    /// The torrent file itself; callers supply the bytes separately.
    File,
}

/// Resolve every non-file field descriptor against a build context.
///
/// # Errors
///
/// Returns [`SchemaError::MissingFieldValue`] when a required field has
/// neither a resolvable source nor a default, or [`SchemaError`] variants
/// bubbled up from option resolution.
pub fn resolve_all(
    descriptors: &[FieldDescriptor],
    options_table: &BTreeMap<String, OptionSpec>,
    ctx: &BuildContext,
) -> SchemaResult<Vec<(String, ResolvedField)>> {
    descriptors
        .iter()
        .map(|descriptor| Ok((descriptor.name.clone(), resolve_one(descriptor, options_table, ctx)?)))
        .collect()
}

fn resolve_one(
    descriptor: &FieldDescriptor,
    options_table: &BTreeMap<String, OptionSpec>,
    ctx: &BuildContext,
) -> SchemaResult<ResolvedField> {
    match descriptor.field_type {
        FieldType::File => Ok(ResolvedField::File),
        FieldType::Option => {
            let option_spec = options_table.get(&descriptor.name).ok_or_else(|| SchemaError::Malformed {
                reason: format!("field '{}' is type 'option' but has no entry in the options table", descriptor.name),
            })?;
            let source = descriptor.source.as_deref().ok_or_else(|| SchemaError::Malformed {
                reason: format!("field '{}' is type 'option' but has no source path", descriptor.name),
            })?;
            let resolved = options::resolve(&descriptor.name, option_spec, ctx, source)?;
            Ok(ResolvedField::Scalar(value_to_string(&resolved)))
        }
        FieldType::Repeated => {
            let source = descriptor.source.as_deref().ok_or_else(|| SchemaError::Malformed {
                reason: format!("field '{}' is type 'repeated' but has no source path", descriptor.name),
            })?;
            let items = ctx.resolve_as_array(source).unwrap_or_default();
            Ok(ResolvedField::Repeated(items.iter().map(value_to_string).collect()))
        }
        FieldType::Json => {
            let resolved = descriptor
                .source
                .as_deref()
                .and_then(|source| ctx.resolve(source).cloned())
                .or_else(|| descriptor.default.clone());
            match resolved {
                Some(value) => Ok(ResolvedField::Scalar(value.to_string())),
                None if descriptor.required => Err(SchemaError::MissingFieldValue {
                    field: descriptor.name.clone(),
                    source_path: descriptor.source.clone().unwrap_or_default(),
                }),
                None => Ok(ResolvedField::Scalar(String::new())),
            }
        }
        FieldType::String | FieldType::Number | FieldType::Boolean => {
            let resolved = descriptor
                .source
                .as_deref()
                .and_then(|source| ctx.resolve(source).cloned())
                .or_else(|| descriptor.default.clone());
            match resolved {
                Some(value) => Ok(ResolvedField::Scalar(value_to_string(&value))),
                None if descriptor.required => Err(SchemaError::MissingFieldValue {
                    field: descriptor.name.clone(),
                    source_path: descriptor.source.clone().unwrap_or_default(),
                }),
                None => Ok(ResolvedField::Scalar(String::new())),
            }
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_a_required_string_field() {
        let ctx = BuildContext::new(json!({"release": {"name": "Movie.2024.1080p"}}));
        let descriptor = FieldDescriptor {
            name: "name".to_string(),
            field_type: FieldType::String,
            source: Some("release.name".to_string()),
            default: None,
            required: true,
        };
        let resolved = resolve_one(&descriptor, &BTreeMap::new(), &ctx).unwrap();
        assert_eq!(resolved, ResolvedField::Scalar("Movie.2024.1080p".to_string()));
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let ctx = BuildContext::new(json!({}));
        let descriptor = FieldDescriptor {
            name: "name".to_string(),
            field_type: FieldType::String,
            source: Some("release.name".to_string()),
            default: None,
            required: true,
        };
        assert!(resolve_one(&descriptor, &BTreeMap::new(), &ctx).is_err());
    }

    #[test]
    fn resolves_repeated_fields_from_an_array() {
        let ctx = BuildContext::new(json!({"tmdb": {"genres": ["Action", "Drama"]}}));
        let descriptor = FieldDescriptor {
            name: "genre".to_string(),
            field_type: FieldType::Repeated,
            source: Some("tmdb.genres".to_string()),
            default: None,
            required: false,
        };
        let resolved = resolve_one(&descriptor, &BTreeMap::new(), &ctx).unwrap();
        assert_eq!(
            resolved,
            ResolvedField::Repeated(vec!["Action".to_string(), "Drama".to_string()])
        );
    }

    #[test]
    fn file_fields_resolve_without_a_source() {
        let ctx = BuildContext::new(json!({}));
        let descriptor = FieldDescriptor {
            name: "torrent".to_string(),
            field_type: FieldType::File,
            source: None,
            default: None,
            required: true,
        };
        assert_eq!(resolve_one(&descriptor, &BTreeMap::new(), &ctx).unwrap(), ResolvedField::File);
    }
}
