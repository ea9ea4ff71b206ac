//! Applies a schema's ordered `sanitize` steps to a generated string, most
//! commonly a release name, before it is sent to a tracker.

use regex::Regex;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::SanitizeStep;

/// Apply every step in order, returning the transformed string.
///
/// # Errors
///
/// Returns [`SchemaError::Malformed`] if a [`SanitizeStep::RemovePattern`]
/// carries an invalid regex.
pub fn apply(steps: &[SanitizeStep], input: &str) -> SchemaResult<String> {
    let mut value = input.to_string();
    for step in steps {
        value = apply_one(step, &value)?;
    }
    Ok(value)
}

fn apply_one(step: &SanitizeStep, input: &str) -> SchemaResult<String> {
    match step {
        SanitizeStep::ReplaceSpaces { with } => {
            let collapsed: Vec<&str> = input.split_whitespace().collect();
            Ok(collapsed.join(with))
        }
        SanitizeStep::RemovePattern { pattern } => {
            let regex = Regex::new(pattern).map_err(|source| SchemaError::Malformed {
                reason: format!("invalid sanitize pattern '{pattern}': {source}"),
            })?;
            Ok(regex.replace_all(input, "").into_owned())
        }
        SanitizeStep::CollapseDots => {
            let mut out = String::with_capacity(input.len());
            let mut last_was_dot = false;
            for ch in input.chars() {
                if ch == '.' {
                    if !last_was_dot {
                        out.push(ch);
                    }
                    last_was_dot = true;
                } else {
                    out.push(ch);
                    last_was_dot = false;
                }
            }
            Ok(out)
        }
        SanitizeStep::Lowercase => Ok(input.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_spaces_and_collapses_dots() {
        let steps = vec![
            SanitizeStep::ReplaceSpaces { with: ".".to_string() },
            SanitizeStep::CollapseDots,
        ];
        let result = apply(&steps, "Movie  Title 2024").unwrap();
        assert_eq!(result, "Movie.Title.2024");
    }

    #[test]
    fn removes_pattern_matches() {
        let steps = vec![SanitizeStep::RemovePattern {
            pattern: r"[^\w.\-]".to_string(),
        }];
        let result = apply(&steps, "Movie: Title!").unwrap();
        assert_eq!(result, "MovieTitle");
    }

    #[test]
    fn rejects_an_invalid_pattern() {
        let steps = vec![SanitizeStep::RemovePattern {
            pattern: "(".to_string(),
        }];
        assert!(apply(&steps, "x").is_err());
    }
}
