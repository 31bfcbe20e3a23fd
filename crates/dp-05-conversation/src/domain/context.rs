//! Copy-on-write context merge.
//!
//! Sessions store a semi-structured map; handlers return a patch, and the
//! engine merges it over a clone of the current map so change detection and
//! persistence always see a fresh object. A patch value of `null` deletes
//! the key.

use serde_json::{Map, Value};

/// Merges `patch` over a clone of `current` and returns the new map.
pub fn merge_context(current: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = current.clone();
    for (key, value) in patch {
        if value.is_null() {
            merged.remove(key);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Convenience accessor for string context values.
pub fn ctx_str<'a>(ctx: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    ctx.get(key).and_then(Value::as_str)
}

/// Builds a single-entry patch.
pub fn patch_one(key: &str, value: impl Into<Value>) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert(key.to_string(), value.into());
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_adds_and_overwrites() {
        let mut current = Map::new();
        current.insert("a".into(), json!("1"));
        current.insert("b".into(), json!("2"));

        let mut patch = Map::new();
        patch.insert("b".into(), json!("3"));
        patch.insert("c".into(), json!("4"));

        let merged = merge_context(&current, &patch);
        assert_eq!(merged["a"], json!("1"));
        assert_eq!(merged["b"], json!("3"));
        assert_eq!(merged["c"], json!("4"));
        // Original untouched (copy-on-write).
        assert_eq!(current["b"], json!("2"));
    }

    #[test]
    fn test_null_deletes_key() {
        let mut current = Map::new();
        current.insert("a".into(), json!("1"));
        let mut patch = Map::new();
        patch.insert("a".into(), Value::Null);

        let merged = merge_context(&current, &patch);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_ctx_str() {
        let mut ctx = Map::new();
        ctx.insert("name".into(), json!("יוסי"));
        ctx.insert("n".into(), json!(5));
        assert_eq!(ctx_str(&ctx, "name"), Some("יוסי"));
        assert_eq!(ctx_str(&ctx, "n"), None);
        assert_eq!(ctx_str(&ctx, "missing"), None);
    }
}
