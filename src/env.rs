//! The environment builder (§4.C): converts a decoded document tree into the
//! variable model and installs the per-pass `params` slot.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::document::DecodedNode;
use crate::value::Value;

/// Recursively converts one decoded node into a `Value`. Only
/// bool/int/string/array/object are expected at this layer (per §4.C);
/// anything else (e.g. a YAML null, a float) degrades to `Value::None`
/// rather than panicking, since the document decoder is an external
/// collaborator whose full grammar this crate does not police.
pub fn to_value<N: DecodedNode>(node: &N) -> Value {
    if let Some(b) = node.as_bool() {
        return Value::Bool(b);
    }
    if let Some(i) = node.as_i64() {
        return Value::Int64(i);
    }
    if let Some(s) = node.as_str() {
        return Value::String(Rc::from(s));
    }
    if let Some(items) = node.as_array() {
        return Value::array(items.into_iter().map(to_value).collect());
    }
    if let Some(entries) = node.as_object() {
        let mut map = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            map.insert(key.to_string(), to_value(value));
        }
        return Value::Object(Rc::new(RefCell::new(map)));
    }
    Value::None
}

/// Builds the root environment from the document root, skipping the
/// `templates` key (it belongs to the driver, not the template language).
pub fn prepare_environment<N: DecodedNode>(root: &N) -> Value {
    let mut map = HashMap::new();
    if let Some(entries) = root.as_object() {
        for (key, value) in entries {
            if key == "templates" {
                continue;
            }
            map.insert(key.to_string(), to_value(value));
        }
    }
    Value::Object(Rc::new(RefCell::new(map)))
}

/// Installs (or replaces) the `params` slot of `root_env` ahead of a single
/// (template, pass) render.
pub fn prepare_pass(root_env: &Value, params: Value) {
    let Value::Object(object) = root_env else {
        return;
    };
    object.borrow_mut().insert("params".to_string(), params);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_templates_key_when_seeding() {
        let doc: serde_json::Value = serde_json::json!({
            "name": "World",
            "templates": [{"template": "x", "output": "y", "passes": []}]
        });
        let env = prepare_environment(&doc);
        let Value::Object(object) = env else { panic!("expected object") };
        let object = object.borrow();
        assert!(object.contains_key("name"));
        assert!(!object.contains_key("templates"));
    }

    #[test]
    fn prepare_pass_replaces_without_leaking_old_keys() {
        let doc: serde_json::Value = serde_json::json!({});
        let env = prepare_environment(&doc);

        prepare_pass(&env, to_value(&serde_json::json!({"a": 1})));
        prepare_pass(&env, to_value(&serde_json::json!({"b": 2})));

        let Value::Object(object) = &env else { panic!("expected object") };
        let object = object.borrow();
        let Value::Object(params) = object.get("params").unwrap() else {
            panic!("expected params object")
        };
        let params = params.borrow();
        assert!(!params.contains_key("a"));
        assert!(params.contains_key("b"));
    }
}
