//! [`DocumentChange`] — an ordered batch of structural ops treated as one
//! logical edit.
//!
//! A change is created client-side from local mutations, cloned during
//! transformation, stored in the hub's log on commit, and broadcast to
//! peers. Once appended to a log it is never mutated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::DocumentStore;
use crate::object_op::{ApplyError, MalformedOpError, ObjectOp, TransformError, TransformOptions};

/// Optional metadata attached to a change. Not interpreted by the algebra.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// An ordered batch of [`ObjectOp`]s representing one logical edit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentChange {
    pub ops: Vec<ObjectOp>,
    pub meta: Option<ChangeMeta>,
}

impl DocumentChange {
    pub fn new(ops: Vec<ObjectOp>) -> Self {
        Self { ops, meta: None }
    }

    pub fn with_meta(ops: Vec<ObjectOp>, meta: ChangeMeta) -> Self {
        Self {
            ops,
            meta: Some(meta),
        }
    }

    /// True when every op in the batch is a NOP.
    pub fn is_nop(&self) -> bool {
        self.ops.iter().all(ObjectOp::is_nop)
    }

    /// Validates every op's construction invariants.
    pub fn validate(&self) -> Result<(), MalformedOpError> {
        for op in &self.ops {
            op.validate()?;
        }
        Ok(())
    }

    /// Applies every op in order. The caller is responsible for applying to
    /// a throwaway copy when partial application must not become visible.
    pub fn apply<S: DocumentStore + ?Sized>(&self, store: &mut S) -> Result<(), ApplyError> {
        for op in &self.ops {
            op.apply(store)?;
        }
        Ok(())
    }

    /// The change that undoes this one: every op inverted, in reverse
    /// order.
    pub fn invert(&self) -> DocumentChange {
        DocumentChange {
            ops: self.ops.iter().rev().map(ObjectOp::invert).collect(),
            meta: self.meta.clone(),
        }
    }

    /// A copy with NOPs dropped. Purely cosmetic; transformation keeps
    /// NOPs in place so batch length and op indices stay stable.
    pub fn compacted(&self) -> DocumentChange {
        DocumentChange {
            ops: self
                .ops
                .iter()
                .filter(|op| !op.is_nop())
                .cloned()
                .collect(),
            meta: self.meta.clone(),
        }
    }

    /// Transforms two concurrent batches against each other in place:
    /// every op of `a` is transformed against every op of `b`, in order.
    pub fn transform(
        a: &mut DocumentChange,
        b: &mut DocumentChange,
        options: &TransformOptions,
    ) -> Result<(), TransformError> {
        for a_op in &mut a.ops {
            for b_op in &mut b.ops {
                ObjectOp::transform_inplace(a_op, b_op, options)?;
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Value {
        let mut m = Map::new();
        m.insert(
            "ops".into(),
            Value::Array(self.ops.iter().map(ObjectOp::to_json).collect()),
        );
        if let Some(meta) = &self.meta {
            m.insert(
                "meta".into(),
                serde_json::to_value(meta).expect("meta serialization is infallible"),
            );
        }
        Value::Object(m)
    }

    pub fn from_json(v: &Value) -> Result<DocumentChange, MalformedOpError> {
        let obj = v
            .as_object()
            .ok_or_else(|| MalformedOpError::InvalidOp("change must be an object".into()))?;
        let ops = obj
            .get("ops")
            .and_then(|v| v.as_array())
            .ok_or(MalformedOpError::MissingField("ops"))?
            .iter()
            .map(ObjectOp::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        let meta = match obj.get("meta") {
            None => None,
            Some(m) => Some(
                serde_json::from_value(m.clone())
                    .map_err(|err| MalformedOpError::InvalidOp(err.to_string()))?,
            ),
        };
        Ok(DocumentChange { ops, meta })
    }
}

impl std::fmt::Display for DocumentChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "change[{}]", self.ops.len())?;
        for op in &self.ops {
            write!(f, " {op};")?;
        }
        Ok(())
    }
}
