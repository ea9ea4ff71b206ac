//! Shallow top-level merge for `FileEntry::metadata`, the structured blob
//! every stage after Scan adds its own named section to (`scan`, `media`,
//! `tmdb`, `presentation`, ...).

use serde_json::Value;

/// Merge `patch`'s top-level object keys into `existing`, overwriting any
/// key both share. `existing` is promoted to an empty object first if it was
/// `Value::Null` (the default for a freshly constructed `FileEntry`).
pub(crate) fn merge_top_level(existing: &mut Value, patch: Value) {
    if existing.is_null() {
        *existing = Value::Object(serde_json::Map::new());
    }
    let (Value::Object(existing_map), Value::Object(patch_map)) = (existing, patch) else {
        return;
    };
    for (key, value) in patch_map {
        existing_map.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merges_into_a_null_root() {
        let mut root = Value::Null;
        merge_top_level(&mut root, json!({"scan": {"title": "Example"}}));
        assert_eq!(root, json!({"scan": {"title": "Example"}}));
    }

    #[test]
    fn overwrites_only_the_patched_keys() {
        let mut root = json!({"scan": {"title": "Example"}});
        merge_top_level(&mut root, json!({"media": {"resolution": "1080p"}}));
        assert_eq!(root, json!({"scan": {"title": "Example"}, "media": {"resolution": "1080p"}}));
    }
}
