//! OT on an ordered sequence of JSON values.
//!
//! An [`ArrayOp`] inserts or deletes a single element at an index. A delete
//! records the removed value for invertibility. The explicit `Nop` variant
//! is what a transform leaves behind when an op loses its target (two
//! concurrent deletes of the same element).

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::value::{deep_clone, deep_equal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArrayOpError {
    #[error("OUT_OF_BOUNDS")]
    OutOfBounds,
    #[error("NOT_AN_ARRAY")]
    NotAnArray,
    #[error("VALUE_MISMATCH")]
    ValueMismatch,
    #[error("INVALID_OP: {0}")]
    InvalidOp(String),
}

/// A single array operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayOp {
    Nop,
    Insert { pos: usize, val: Value },
    Delete { pos: usize, val: Value },
}

impl ArrayOp {
    pub fn insert(pos: usize, val: Value) -> Self {
        ArrayOp::Insert { pos, val }
    }

    pub fn delete(pos: usize, val: Value) -> Self {
        ArrayOp::Delete { pos, val }
    }

    pub fn is_nop(&self) -> bool {
        matches!(self, ArrayOp::Nop)
    }

    /// Applies the op to an array value, with strict bounds checks.
    ///
    /// A delete verifies that the recorded value structurally matches the
    /// element actually removed.
    pub fn apply(&self, target: &Value) -> Result<Value, ArrayOpError> {
        let items = target.as_array().ok_or(ArrayOpError::NotAnArray)?;
        match self {
            ArrayOp::Nop => Ok(deep_clone(target)),
            ArrayOp::Insert { pos, val } => {
                if *pos > items.len() {
                    return Err(ArrayOpError::OutOfBounds);
                }
                let mut out: Vec<Value> = items.iter().map(deep_clone).collect();
                out.insert(*pos, deep_clone(val));
                Ok(Value::Array(out))
            }
            ArrayOp::Delete { pos, val } => {
                if *pos >= items.len() {
                    return Err(ArrayOpError::OutOfBounds);
                }
                if !deep_equal(&items[*pos], val) {
                    return Err(ArrayOpError::ValueMismatch);
                }
                let mut out: Vec<Value> = items.iter().map(deep_clone).collect();
                out.remove(*pos);
                Ok(Value::Array(out))
            }
        }
    }

    pub fn invert(&self) -> ArrayOp {
        match self {
            ArrayOp::Nop => ArrayOp::Nop,
            ArrayOp::Insert { pos, val } => ArrayOp::Delete {
                pos: *pos,
                val: deep_clone(val),
            },
            ArrayOp::Delete { pos, val } => ArrayOp::Insert {
                pos: *pos,
                val: deep_clone(val),
            },
        }
    }

    /// Merges two sequential ops when the result is still a single op:
    /// an insert followed by the delete of the same element cancels to a
    /// NOP. `second` applies after `self`.
    pub fn compose(&self, second: &ArrayOp) -> Option<ArrayOp> {
        if self.is_nop() {
            return Some(second.clone());
        }
        if second.is_nop() {
            return Some(self.clone());
        }
        match (self, second) {
            (ArrayOp::Insert { pos: p1, val: v1 }, ArrayOp::Delete { pos: p2, val: v2 })
                if p1 == p2 && deep_equal(v1, v2) =>
            {
                Some(ArrayOp::Nop)
            }
            _ => None,
        }
    }

    /// Transforms two concurrent ops against each other, cloning the inputs.
    pub fn transform(a: &ArrayOp, b: &ArrayOp) -> (ArrayOp, ArrayOp) {
        let mut a = a.clone();
        let mut b = b.clone();
        ArrayOp::transform_inplace(&mut a, &mut b);
        (a, b)
    }

    /// In-place variant of [`ArrayOp::transform`].
    ///
    /// Index ties between two inserts break in favor of `a`. Two deletes of
    /// the same index both become NOP.
    pub fn transform_inplace(a: &mut ArrayOp, b: &mut ArrayOp) {
        if a.is_nop() || b.is_nop() {
            return;
        }
        if let (ArrayOp::Delete { pos: a_pos, .. }, ArrayOp::Delete { pos: b_pos, .. }) = (&*a, &*b)
        {
            if a_pos == b_pos {
                *a = ArrayOp::Nop;
                *b = ArrayOp::Nop;
                return;
            }
        }
        match (&mut *a, &mut *b) {
            (ArrayOp::Insert { pos: a_pos, .. }, ArrayOp::Insert { pos: b_pos, .. }) => {
                if *a_pos <= *b_pos {
                    *b_pos += 1;
                } else {
                    *a_pos += 1;
                }
            }
            (ArrayOp::Insert { pos: a_pos, .. }, ArrayOp::Delete { pos: b_pos, .. }) => {
                if *a_pos <= *b_pos {
                    *b_pos += 1;
                } else {
                    *a_pos -= 1;
                }
            }
            (ArrayOp::Delete { pos: a_pos, .. }, ArrayOp::Insert { pos: b_pos, .. }) => {
                if *b_pos <= *a_pos {
                    *a_pos += 1;
                } else {
                    *b_pos -= 1;
                }
            }
            (ArrayOp::Delete { pos: a_pos, .. }, ArrayOp::Delete { pos: b_pos, .. }) => {
                if *a_pos < *b_pos {
                    *b_pos -= 1;
                } else {
                    *a_pos -= 1;
                }
            }
            _ => {}
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ArrayOp::Nop => json!({ "type": "NOP" }),
            ArrayOp::Insert { pos, val } => json!({ "type": "insert", "pos": pos, "val": val }),
            ArrayOp::Delete { pos, val } => json!({ "type": "delete", "pos": pos, "val": val }),
        }
    }

    pub fn from_json(v: &Value) -> Result<ArrayOp, ArrayOpError> {
        let obj: &Map<String, Value> = v
            .as_object()
            .ok_or_else(|| ArrayOpError::InvalidOp("array op must be an object".into()))?;
        let kind = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ArrayOpError::InvalidOp("missing 'type'".into()))?;
        if kind == "NOP" {
            return Ok(ArrayOp::Nop);
        }
        let pos = obj
            .get("pos")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ArrayOpError::InvalidOp("missing 'pos'".into()))? as usize;
        let val = obj
            .get("val")
            .cloned()
            .ok_or_else(|| ArrayOpError::InvalidOp("missing 'val'".into()))?;
        match kind {
            "insert" => Ok(ArrayOp::Insert { pos, val }),
            "delete" => Ok(ArrayOp::Delete { pos, val }),
            other => Err(ArrayOpError::InvalidOp(format!("unknown type: {other}"))),
        }
    }
}

impl std::fmt::Display for ArrayOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayOp::Nop => write!(f, "nop"),
            ArrayOp::Insert { pos, val } => write!(f, "ins {val} @{pos}"),
            ArrayOp::Delete { pos, val } => write!(f, "del {val} @{pos}"),
        }
    }
}
