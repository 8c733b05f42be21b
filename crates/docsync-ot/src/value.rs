//! Deep clone and structural equality over JSON values.
//!
//! Operations treat their payloads as values: nothing handed to a document
//! may alias an op's stored `val`, so every apply goes through
//! [`deep_clone`]. Equality is structural and object-key-order insensitive.

use serde_json::{Map, Value};

/// Creates a deep copy of a JSON value.
pub fn deep_clone(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => Value::Number(n.clone()),
        Value::String(s) => Value::String(s.clone()),
        Value::Array(items) => Value::Array(items.iter().map(deep_clone).collect()),
        Value::Object(fields) => {
            let mut out = Map::with_capacity(fields.len());
            for (key, val) in fields {
                out.insert(key.clone(), deep_clone(val));
            }
            Value::Object(out)
        }
    }
}

/// Structural equality of two JSON values.
///
/// Object comparison ignores key order; arrays compare element-wise.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clone_is_deep() {
        let original = json!({"a": [1, 2, {"b": "c"}], "d": null});
        let cloned = deep_clone(&original);
        assert_eq!(original, cloned);
    }

    #[test]
    fn equal_ignores_key_order() {
        assert!(deep_equal(
            &json!({"a": 1, "b": [true, "x"]}),
            &json!({"b": [true, "x"], "a": 1})
        ));
    }

    #[test]
    fn unequal_types() {
        assert!(!deep_equal(&json!(0), &json!(null)));
        assert!(!deep_equal(&json!(1), &json!(true)));
        assert!(!deep_equal(&json!({}), &json!([])));
    }

    #[test]
    fn unequal_nested() {
        assert!(!deep_equal(
            &json!({"a": {"b": [1, 2]}}),
            &json!({"a": {"b": [1, 3]}})
        ));
    }
}
