//! The document store the operation algebra applies to.
//!
//! The core only ever talks to a [`DocumentStore`]: `get`, `set`, and a
//! strict `delete`. [`JsonDocument`] is the concrete store over a root JSON
//! value; navigation uses RFC 6901 pointers. Anything beyond these three
//! primitives (schema checks, observers) belongs to the embedding
//! application, not here.

use serde_json::Value;
use thiserror::Error;

use crate::path::format_path;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("NOT_FOUND")]
    NotFound,
    #[error("NO_PARENT")]
    NoParent,
    #[error("INVALID_INDEX")]
    InvalidIndex,
    #[error("INVALID_TARGET")]
    InvalidTarget,
}

/// The adapter surface consumed by [`ObjectOp::apply`](crate::object_op::ObjectOp::apply).
pub trait DocumentStore {
    /// Returns the value at `path`, or `None` when the path is absent.
    fn get(&self, path: &[String]) -> Option<&Value>;

    /// Writes `val` at `path`, creating or overwriting the property. The
    /// parent container must exist.
    fn set(&mut self, path: &[String], val: Value) -> Result<(), DocumentError>;

    /// Removes the value at `path` and returns it. Strict: an absent path
    /// is an error.
    fn delete(&mut self, path: &[String]) -> Result<Value, DocumentError>;
}

/// A document held as a single JSON tree.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    root: Value,
}

impl JsonDocument {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_root(self) -> Value {
        self.root
    }

    fn parent_mut<'a>(
        &'a mut self,
        path: &'a [String],
    ) -> Result<(&'a mut Value, &'a str), DocumentError> {
        let (parent_path, key) = path.split_at(path.len() - 1);
        let parent = self
            .root
            .pointer_mut(&format_path(parent_path))
            .ok_or(DocumentError::NoParent)?;
        Ok((parent, &key[0]))
    }
}

impl Default for JsonDocument {
    fn default() -> Self {
        Self::new(Value::Object(serde_json::Map::new()))
    }
}

impl DocumentStore for JsonDocument {
    fn get(&self, path: &[String]) -> Option<&Value> {
        self.root.pointer(&format_path(path))
    }

    fn set(&mut self, path: &[String], val: Value) -> Result<(), DocumentError> {
        if path.is_empty() {
            self.root = val;
            return Ok(());
        }
        let (parent, key) = self.parent_mut(path)?;
        match parent {
            Value::Object(fields) => {
                fields.insert(key.to_string(), val);
                Ok(())
            }
            Value::Array(items) => {
                let idx: usize = key.parse().map_err(|_| DocumentError::InvalidIndex)?;
                if idx >= items.len() {
                    return Err(DocumentError::InvalidIndex);
                }
                items[idx] = val;
                Ok(())
            }
            _ => Err(DocumentError::InvalidTarget),
        }
    }

    fn delete(&mut self, path: &[String]) -> Result<Value, DocumentError> {
        if path.is_empty() {
            return Err(DocumentError::InvalidTarget);
        }
        let (parent, key) = self.parent_mut(path)?;
        match parent {
            Value::Object(fields) => fields.remove(key).ok_or(DocumentError::NotFound),
            Value::Array(items) => {
                let idx: usize = key.parse().map_err(|_| DocumentError::InvalidIndex)?;
                if idx >= items.len() {
                    return Err(DocumentError::NotFound);
                }
                Ok(items.remove(idx))
            }
            _ => Err(DocumentError::InvalidTarget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> Vec<String> {
        s.split('/').filter(|p| !p.is_empty()).map(String::from).collect()
    }

    #[test]
    fn get_navigates_nested() {
        let doc = JsonDocument::new(json!({"a": {"b": [1, 2]}}));
        assert_eq!(doc.get(&path("a/b/1")), Some(&json!(2)));
        assert_eq!(doc.get(&path("a/x")), None);
    }

    #[test]
    fn set_inserts_and_overwrites() {
        let mut doc = JsonDocument::default();
        doc.set(&path("title"), json!("Hi")).unwrap();
        doc.set(&path("title"), json!("Hello")).unwrap();
        assert_eq!(doc.root(), &json!({"title": "Hello"}));
    }

    #[test]
    fn set_requires_parent() {
        let mut doc = JsonDocument::default();
        assert_eq!(
            doc.set(&path("a/b"), json!(1)),
            Err(DocumentError::NoParent)
        );
    }

    #[test]
    fn set_array_replaces_in_range() {
        let mut doc = JsonDocument::new(json!({"xs": [1, 2]}));
        doc.set(&path("xs/1"), json!(9)).unwrap();
        assert_eq!(doc.root(), &json!({"xs": [1, 9]}));
        assert_eq!(
            doc.set(&path("xs/2"), json!(0)),
            Err(DocumentError::InvalidIndex)
        );
    }

    #[test]
    fn delete_is_strict() {
        let mut doc = JsonDocument::new(json!({"a": 1}));
        assert_eq!(doc.delete(&path("a")), Ok(json!(1)));
        assert_eq!(doc.delete(&path("a")), Err(DocumentError::NotFound));
    }

    #[test]
    fn delete_array_element() {
        let mut doc = JsonDocument::new(json!({"xs": ["a", "b"]}));
        assert_eq!(doc.delete(&path("xs/0")), Ok(json!("a")));
        assert_eq!(doc.root(), &json!({"xs": ["b"]}));
    }
}
