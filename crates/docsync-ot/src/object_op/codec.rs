//! Canonical JSON form of structural operations.
//!
//! ```text
//! { "type": "create"|"delete"|"update"|"set"|"NOP",
//!   "path": [string, ...],
//!   "val"?: any,                        // create, delete, set
//!   "original"?: any,                   // set
//!   "propertyType"?: "string"|"array",  // update
//!   "diff"?: <leaf-op JSON> }           // update
//! ```
//!
//! `from_json` is the construction-time validation boundary: unknown tags,
//! missing fields, empty paths, and diff/propertyType mismatches all fail
//! with [`MalformedOpError`] before an op comes into existence.

use serde_json::{json, Map, Value};

use crate::array_op::ArrayOp;
use crate::path::Path;
use crate::text_op::TextOp;

use super::types::{Diff, MalformedOpError, ObjectOp};

fn encode_path(path: &Path) -> Value {
    Value::Array(path.iter().map(|s| Value::String(s.clone())).collect())
}

fn decode_path(obj: &Map<String, Value>) -> Result<Path, MalformedOpError> {
    let segments = obj
        .get("path")
        .and_then(|v| v.as_array())
        .ok_or(MalformedOpError::MissingField("path"))?;
    let path: Path = segments
        .iter()
        .map(|s| {
            s.as_str()
                .map(String::from)
                .ok_or_else(|| MalformedOpError::InvalidOp("path segment must be a string".into()))
        })
        .collect::<Result<_, _>>()?;
    if path.is_empty() {
        return Err(MalformedOpError::EmptyPath);
    }
    Ok(path)
}

impl Diff {
    /// Serializes the leaf op, untagged; the property type travels beside
    /// it in the Update's own JSON form.
    pub fn to_json(&self) -> Value {
        match self {
            Diff::Text(op) => op.to_json(),
            Diff::Array(op) => op.to_json(),
        }
    }

    /// Reconstructs a leaf op by dispatch on the serialized property type.
    pub fn from_json(property_type: &str, diff: &Value) -> Result<Diff, MalformedOpError> {
        match property_type {
            "string" => TextOp::from_json(diff)
                .map(Diff::Text)
                .map_err(|err| MalformedOpError::InvalidOp(err.to_string())),
            "array" => ArrayOp::from_json(diff)
                .map(Diff::Array)
                .map_err(|err| MalformedOpError::InvalidOp(err.to_string())),
            other => Err(MalformedOpError::UnknownPropertyType(other.to_string())),
        }
    }
}

impl ObjectOp {
    pub fn to_json(&self) -> Value {
        match self {
            ObjectOp::Nop => json!({ "type": "NOP" }),
            ObjectOp::Create { path, val } => json!({
                "type": "create",
                "path": encode_path(path),
                "val": val,
            }),
            ObjectOp::Delete { path, val } => json!({
                "type": "delete",
                "path": encode_path(path),
                "val": val,
            }),
            ObjectOp::Update { path, diff } => json!({
                "type": "update",
                "path": encode_path(path),
                "propertyType": diff.property_type(),
                "diff": diff.to_json(),
            }),
            ObjectOp::Set {
                path,
                original,
                val,
            } => {
                let mut m = Map::new();
                m.insert("type".into(), json!("set"));
                m.insert("path".into(), encode_path(path));
                if let Some(v) = val {
                    m.insert("val".into(), v.clone());
                }
                if let Some(o) = original {
                    m.insert("original".into(), o.clone());
                }
                Value::Object(m)
            }
        }
    }

    pub fn from_json(v: &Value) -> Result<ObjectOp, MalformedOpError> {
        let obj = v
            .as_object()
            .ok_or_else(|| MalformedOpError::InvalidOp("op must be an object".into()))?;
        let kind = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(MalformedOpError::MissingField("type"))?;
        match kind {
            "NOP" => Ok(ObjectOp::Nop),
            "create" => Ok(ObjectOp::Create {
                path: decode_path(obj)?,
                val: obj
                    .get("val")
                    .cloned()
                    .ok_or(MalformedOpError::MissingField("val"))?,
            }),
            "delete" => Ok(ObjectOp::Delete {
                path: decode_path(obj)?,
                val: obj
                    .get("val")
                    .cloned()
                    .ok_or(MalformedOpError::MissingField("val"))?,
            }),
            "update" => {
                let path = decode_path(obj)?;
                let property_type = obj
                    .get("propertyType")
                    .and_then(|v| v.as_str())
                    .ok_or(MalformedOpError::MissingField("propertyType"))?;
                let diff = obj
                    .get("diff")
                    .ok_or(MalformedOpError::MissingField("diff"))?;
                Ok(ObjectOp::Update {
                    path,
                    diff: Diff::from_json(property_type, diff)?,
                })
            }
            "set" => Ok(ObjectOp::Set {
                path: decode_path(obj)?,
                original: obj.get("original").cloned(),
                val: obj.get("val").cloned(),
            }),
            other => Err(MalformedOpError::UnknownType(other.to_string())),
        }
    }
}
