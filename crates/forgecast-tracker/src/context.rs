//! The value tree a tracker schema's field sources are resolved against:
//! media info, TMDB metadata, the generated NFO text, and computed option
//! values, all flattened into one JSON document so a schema author can write
//! dotted paths like `media.resolution` or `tmdb.genres`.

use serde_json::Value;

/// A resolvable tree of upload-time values.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    root: Value,
}

impl BuildContext {
    /// Build a context from an already-assembled JSON tree, typically
    /// produced by the pipeline's Generate stage.
    #[must_use]
    pub const fn new(root: Value) -> Self {
        Self { root }
    }

    /// Resolve a dot-separated path (`"media.resolution"`) against the tree.
    /// Returns `None` if any segment is missing or the path descends into a
    /// non-object value.
    #[must_use]
    pub fn resolve(&self, dotted_path: &str) -> Option<&Value> {
        dotted_path
            .split('.')
            .try_fold(&self.root, |current, segment| current.get(segment))
    }

    /// Resolve a path and render it as a plain string using the same rules a
    /// multipart form field would: strings pass through unquoted, other
    /// scalars use their display form, and missing/complex values yield
    /// `None`.
    #[must_use]
    pub fn resolve_as_string(&self, dotted_path: &str) -> Option<String> {
        match self.resolve(dotted_path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(_) | Value::Object(_) | Value::Null => None,
        }
    }

    /// Resolve a path expected to be a JSON array, returning its elements.
    #[must_use]
    pub fn resolve_as_array(&self, dotted_path: &str) -> Option<&[Value]> {
        match self.resolve(dotted_path)? {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_paths() {
        let ctx = BuildContext::new(json!({"media": {"resolution": "1080p"}}));
        assert_eq!(ctx.resolve_as_string("media.resolution").as_deref(), Some("1080p"));
    }

    #[test]
    fn missing_path_is_none() {
        let ctx = BuildContext::new(json!({"media": {}}));
        assert!(ctx.resolve("media.resolution").is_none());
        assert!(ctx.resolve("tmdb.genres").is_none());
    }

    #[test]
    fn resolves_arrays() {
        let ctx = BuildContext::new(json!({"tmdb": {"genres": ["Action", "Drama"]}}));
        let genres = ctx.resolve_as_array("tmdb.genres").expect("array");
        assert_eq!(genres.len(), 2);
    }
}
