//! Merge rules for incoming configuration.
//!
//! Merging is one level deep: when both sides of a top-level key are
//! mappings, the incoming keys override or extend the existing ones and
//! everything below that first level is replaced whole. Any other pairing
//! (scalar, sequence, null) is replaced outright.

use serde_json::{Map, Value};
use tracing::debug;

/// Shallow merge `overlay` onto `base`, with `overlay` taking precedence.
///
/// # Example
/// ```
/// use serde_json::json;
/// use bootstrap_config::config::shallow_merge;
///
/// let base = json!({"script": "10.0.0.1", "media": "10.0.0.2"});
/// let overlay = json!({"script": "10.0.0.9"});
/// let result = shallow_merge(base, overlay);
/// assert_eq!(result, json!({"script": "10.0.0.9", "media": "10.0.0.2"}));
/// ```
pub fn shallow_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                base_map.insert(key, overlay_value);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge a mapping of top-level keys into `target`.
///
/// Empty keys are skipped. Existing keys keep their position in `target`.
/// Returns the number of keys merged.
pub fn merge_into(target: &mut Map<String, Value>, incoming: Map<String, Value>) -> usize {
    let mut merged = 0;
    for (key, value) in incoming {
        if key.is_empty() {
            debug!("Skipping empty configuration key");
            continue;
        }

        match target.get_mut(&key) {
            Some(existing) => {
                let current = existing.take();
                *existing = shallow_merge(current, value);
            }
            None => {
                target.insert(key, value);
            }
        }
        merged += 1;
    }
    merged
}
