//! Deep merge of config objects.

use serde_json::Value;

/// Merge `next` over `prev`.
///
/// Objects merge key by key, recursively. Arrays concatenate with duplicates
/// removed, keeping the first occurrence. Anything else is replaced by `next`.
///
/// ```
/// use serde_json::json;
/// use toolrig_core::config::merge::deep_merge;
///
/// let merged = deep_merge(
///     json!({"plugins": ["a"], "rules": {"semi": "off"}}),
///     json!({"plugins": ["a", "b"], "rules": {"quotes": "single"}}),
/// );
/// assert_eq!(
///     merged,
///     json!({"plugins": ["a", "b"], "rules": {"semi": "off", "quotes": "single"}})
/// );
/// ```
#[must_use]
pub fn deep_merge(prev: Value, next: Value) -> Value {
    match (prev, next) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (Value::Array(mut base), Value::Array(overlay)) => {
            for value in overlay {
                if !base.contains(&value) {
                    base.push(value);
                }
            }
            Value::Array(base)
        }
        (_, next) => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_objects_merge() {
        let merged = deep_merge(
            json!({"compilerOptions": {"strict": true, "target": "es2019"}}),
            json!({"compilerOptions": {"target": "es2022"}, "include": ["src"]}),
        );
        assert_eq!(
            merged,
            json!({
                "compilerOptions": {"strict": true, "target": "es2022"},
                "include": ["src"]
            })
        );
    }

    #[test]
    fn test_arrays_dedupe_objects_too() {
        let merged = deep_merge(
            json!([{"files": "*.ts"}, "x"]),
            json!(["x", {"files": "*.ts"}, "y"]),
        );
        assert_eq!(merged, json!([{"files": "*.ts"}, "x", "y"]));
    }

    #[test]
    fn test_mismatched_types_replace() {
        assert_eq!(deep_merge(json!({"a": 1}), json!([1])), json!([1]));
        assert_eq!(deep_merge(json!("x"), json!(null)), json!(null));
    }
}
