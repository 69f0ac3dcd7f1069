//! Caller overrides merged into an API-format prompt.
//!
//! Each key is applied in order:
//! - `"6.inputs.text"` sets the value at a dotted path, creating objects as needed
//! - `"6"` with an object value shallow-merges into node `6`'s `inputs`
//! - any other key is set at the top level

use serde_json::{Map, Value};

/// Apply `inputs` to a copy of `prompt`. The original is left untouched.
pub fn apply_inputs(prompt: &Value, inputs: &Map<String, Value>) -> Value {
    let mut cloned = prompt.clone();
    if !cloned.is_object() {
        cloned = Value::Object(Map::new());
    }

    for (key, value) in inputs {
        if key.contains('.') {
            set_by_path(&mut cloned, key, value.clone());
            continue;
        }

        if let Some(Value::Object(node_inputs)) = cloned
            .get_mut(key.as_str())
            .filter(|node| node.is_object())
            .and_then(|node| node.get_mut("inputs"))
        {
            if let Value::Object(patch) = value {
                for (k, v) in patch {
                    node_inputs.insert(k.clone(), v.clone());
                }
                continue;
            }
        }

        if let Value::Object(obj) = &mut cloned {
            obj.insert(key.clone(), value.clone());
        }
    }

    cloned
}

fn set_by_path(target: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut current = target;
    for part in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(obj) = current else {
            return;
        };
        let next = obj
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !next.is_object() {
            *next = Value::Object(Map::new());
        }
        current = next;
    }

    if let Value::Object(obj) = current {
        obj.insert(last.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prompt() -> Value {
        json!({
            "6": {
                "class_type": "CLIPTextEncode",
                "inputs": { "text": "old", "seed": 5 }
            },
            "client": "default"
        })
    }

    fn overrides(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_dotted_path_preserves_siblings() {
        let out = apply_inputs(&prompt(), &overrides(json!({ "6.inputs.text": "hello" })));
        assert_eq!(out["6"]["inputs"], json!({ "text": "hello", "seed": 5 }));
        assert_eq!(out["6"]["class_type"], "CLIPTextEncode");
    }

    #[test]
    fn test_dotted_path_creates_missing_objects() {
        let out = apply_inputs(&prompt(), &overrides(json!({ "9.inputs.steps": 20 })));
        assert_eq!(out["9"], json!({ "inputs": { "steps": 20 } }));

        // A scalar in the way is replaced by an object.
        let out = apply_inputs(&prompt(), &overrides(json!({ "client.name": "x" })));
        assert_eq!(out["client"], json!({ "name": "x" }));
    }

    #[test]
    fn test_node_shorthand_shallow_merges_inputs() {
        let out = apply_inputs(&prompt(), &overrides(json!({ "6": { "seed": 99 } })));
        assert_eq!(out["6"]["inputs"]["seed"], 99);
        assert_eq!(out["6"]["inputs"]["text"], "old");
    }

    #[test]
    fn test_non_object_value_for_node_replaces_top_level() {
        let out = apply_inputs(&prompt(), &overrides(json!({ "6": "gone", "extra": [1] })));
        assert_eq!(out["6"], "gone");
        assert_eq!(out["extra"], json!([1]));
    }

    #[test]
    fn test_original_is_not_mutated() {
        let original = prompt();
        let snapshot = original.clone();
        let _ = apply_inputs(
            &original,
            &overrides(json!({ "6.inputs.text": "new", "6": { "seed": 1 }, "x": 1 })),
        );
        assert_eq!(original, snapshot);
    }
}
