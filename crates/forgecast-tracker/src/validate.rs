//! Applies a schema's `validation` table to resolved field values before an
//! upload request is built.

use regex::Regex;

use crate::error::{SchemaError, SchemaResult};
use crate::fields::ResolvedField;
use crate::schema::FieldValidation;

/// Validate one field's resolved value against its declared rule, if any.
///
/// # Errors
///
/// Returns [`SchemaError::ValidationFailed`] when the rule is violated, or
/// [`SchemaError::Malformed`] when `pattern` is not a valid regex.
pub fn validate_field(field: &str, rule: &FieldValidation, value: &ResolvedField) -> SchemaResult<()> {
    let ResolvedField::Scalar(text) = value else {
        return Ok(());
    };

    if rule.required && text.trim().is_empty() {
        return Err(SchemaError::ValidationFailed {
            field: field.to_string(),
            reason: "value is required but empty".to_string(),
        });
    }

    if let Some(min) = rule.min_length {
        if text.len() < min {
            return Err(SchemaError::ValidationFailed {
                field: field.to_string(),
                reason: format!("length {} is below minimum {min}", text.len()),
            });
        }
    }

    if let Some(max) = rule.max_length {
        if text.len() > max {
            return Err(SchemaError::ValidationFailed {
                field: field.to_string(),
                reason: format!("length {} exceeds maximum {max}", text.len()),
            });
        }
    }

    if let Some(pattern) = &rule.pattern {
        let regex = Regex::new(pattern).map_err(|source| SchemaError::Malformed {
            reason: format!("invalid validation pattern for '{field}': {source}"),
        })?;
        if !regex.is_match(text) {
            return Err(SchemaError::ValidationFailed {
                field: field.to_string(),
                reason: format!("value does not match pattern '{pattern}'"),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_required_field() {
        let rule = FieldValidation {
            required: true,
            ..FieldValidation::default()
        };
        let err = validate_field("name", &rule, &ResolvedField::Scalar(String::new())).unwrap_err();
        assert!(matches!(err, SchemaError::ValidationFailed { .. }));
    }

    #[test]
    fn rejects_values_outside_length_bounds() {
        let rule = FieldValidation {
            min_length: Some(3),
            max_length: Some(5),
            ..FieldValidation::default()
        };
        assert!(validate_field("name", &rule, &ResolvedField::Scalar("ab".to_string())).is_err());
        assert!(validate_field("name", &rule, &ResolvedField::Scalar("abcdef".to_string())).is_err());
        assert!(validate_field("name", &rule, &ResolvedField::Scalar("abcd".to_string())).is_ok());
    }

    #[test]
    fn rejects_values_failing_a_pattern() {
        let rule = FieldValidation {
            pattern: Some(r"^\d+$".to_string()),
            ..FieldValidation::default()
        };
        assert!(validate_field("year", &rule, &ResolvedField::Scalar("2024".to_string())).is_ok());
        assert!(validate_field("year", &rule, &ResolvedField::Scalar("abcd".to_string())).is_err());
    }

    #[test]
    fn skips_non_scalar_values() {
        let rule = FieldValidation {
            required: true,
            ..FieldValidation::default()
        };
        assert!(validate_field("torrent", &rule, &ResolvedField::File).is_ok());
    }
}
