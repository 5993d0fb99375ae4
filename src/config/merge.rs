//! Layer merge for configuration values.
//!
//! Layers are plain JSON trees:
//! - Objects: merged by key (recursive)
//! - Arrays: replaced, never concatenated
//! - Scalars: the later layer wins

use serde_json::Value;

/// Merge `overlay` on top of `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Fold layers in order; the last layer has the highest precedence.
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}
