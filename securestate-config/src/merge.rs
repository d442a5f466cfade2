// Deep merge of JSON configuration trees

use serde_json::Value;

/// Merge `patch` into `target`.
///
/// Objects are merged key by key, recursively. Any other value in `patch`
/// replaces the value in `target`. Explicit `null`s in `patch` are skipped so
/// a partial document can never erase a nested group.
///
/// ```
/// use securestate_config::deep_merge;
/// use serde_json::json;
///
/// let mut base = json!({"cookie_options": {"path": "/", "http_only": true}});
/// deep_merge(&mut base, json!({"cookie_options": {"path": "/app"}}));
///
/// assert_eq!(base, json!({"cookie_options": {"path": "/app", "http_only": true}}));
/// ```
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (_, Value::Null) => {}
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    Some(_) if value.is_null() => {}
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}
