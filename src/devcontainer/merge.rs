//! Field-aware merge of devcontainer configuration trees.

use serde_json::{Map, Value};

/// Result of [`merge_devcontainer`].
#[derive(Debug, Clone)]
pub struct DevcontainerMerge {
    pub merged: Value,
    pub warnings: Vec<String>,
}

fn port_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn union_array(base: Option<&Value>, addition: &Value, key: impl Fn(&Value) -> String) -> Value {
    let mut items: Vec<Value> = base.and_then(Value::as_array).cloned().unwrap_or_default();
    let mut seen: Vec<String> = items.iter().map(&key).collect();
    for item in addition.as_array().into_iter().flatten() {
        let k = key(item);
        if !seen.contains(&k) {
            seen.push(k);
            items.push(item.clone());
        }
    }
    Value::Array(items)
}

fn merge_ports_attributes(base: Option<&Value>, addition: &Map<String, Value>) -> Value {
    let mut merged = base.and_then(Value::as_object).cloned().unwrap_or_default();
    for (port, attributes) in addition {
        match (merged.get_mut(port), attributes) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (k, v) in incoming {
                    existing.insert(k.clone(), v.clone());
                }
            }
            _ => {
                merged.insert(port.clone(), attributes.clone());
            }
        }
    }
    Value::Object(merged)
}

/// Merges `addition` into `entries`, keeping existing values and reporting conflicts.
pub(crate) fn merge_container_env(
    entries: &mut Map<String, Value>,
    addition: impl IntoIterator<Item = (String, Value)>,
    warnings: &mut Vec<String>,
) {
    for (key, value) in addition {
        match entries.get(&key) {
            Some(existing) => {
                if *existing != value {
                    warnings.push(format!("containerEnv already defines {key}; keeping existing value."));
                }
            }
            None => {
                entries.insert(key, value);
            }
        }
    }
}

/// Merges a sidecar's devcontainer fragment into a base configuration.
///
/// | Field            | Rule                                                  |
/// |------------------|-------------------------------------------------------|
/// | `runServices`    | ordered union, deduplicated by value                  |
/// | `forwardPorts`   | ordered union, membership by string representation    |
/// | `portsAttributes`| per port, addition attributes shallow-merged over base|
/// | `containerEnv`   | absent keys added; conflicting keys keep base + warn  |
/// | `features`       | key union; base options kept for shared features      |
/// | anything else    | added only when base lacks the key                    |
///
/// Non-object inputs leave the base untouched.
#[must_use]
pub fn merge_devcontainer(base: &Value, addition: &Value) -> DevcontainerMerge {
    let mut warnings = Vec::new();
    let (Some(base_map), Some(addition_map)) = (base.as_object(), addition.as_object()) else {
        return DevcontainerMerge {
            merged: base.clone(),
            warnings,
        };
    };

    let mut merged = base_map.clone();
    for (key, value) in addition_map {
        match key.as_str() {
            "runServices" => {
                let union = union_array(base_map.get(key), value, |v| v.to_string());
                merged.insert(key.clone(), union);
            }
            "forwardPorts" => {
                let union = union_array(base_map.get(key), value, port_key);
                merged.insert(key.clone(), union);
            }
            "portsAttributes" => {
                if let Some(attributes) = value.as_object() {
                    let combined = merge_ports_attributes(base_map.get(key), attributes);
                    merged.insert(key.clone(), combined);
                }
            }
            "containerEnv" => {
                if let Some(additions) = value.as_object() {
                    let mut env = base_map.get(key).and_then(Value::as_object).cloned().unwrap_or_default();
                    merge_container_env(&mut env, additions.clone(), &mut warnings);
                    merged.insert(key.clone(), Value::Object(env));
                }
            }
            "features" => {
                if let Some(additions) = value.as_object() {
                    let mut features =
                        base_map.get(key).and_then(Value::as_object).cloned().unwrap_or_default();
                    for (feature, options) in additions {
                        if !features.contains_key(feature) {
                            features.insert(feature.clone(), options.clone());
                        }
                    }
                    merged.insert(key.clone(), Value::Object(features));
                }
            }
            _ => {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }

    DevcontainerMerge {
        merged: Value::Object(merged),
        warnings,
    }
}
