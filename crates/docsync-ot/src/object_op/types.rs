//! Core types for the structural algebra.

use serde_json::Value;
use thiserror::Error;

use crate::array_op::ArrayOp;
use crate::path::{format_path, Path};
use crate::text_op::TextOp;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MalformedOpError {
    #[error("missing '{0}'")]
    MissingField(&'static str),
    #[error("unknown op type: {0}")]
    UnknownType(String),
    #[error("empty path")]
    EmptyPath,
    #[error("unknown property type: {0}")]
    UnknownPropertyType(String),
    #[error("INVALID_OP: {0}")]
    InvalidOp(String),
}

// ── Diff ──────────────────────────────────────────────────────────────────

/// The nested leaf operation carried by an Update.
///
/// The variant is the discriminant; the `"string"`/`"array"` property-type
/// tag is a derived view of it, serialized only for persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    Text(TextOp),
    Array(ArrayOp),
}

impl Diff {
    pub fn property_type(&self) -> &'static str {
        match self {
            Diff::Text(_) => "string",
            Diff::Array(_) => "array",
        }
    }

    pub fn is_nop(&self) -> bool {
        match self {
            Diff::Text(op) => op.is_nop(),
            Diff::Array(op) => op.is_nop(),
        }
    }

    pub fn invert(&self) -> Diff {
        match self {
            Diff::Text(op) => Diff::Text(op.invert()),
            Diff::Array(op) => Diff::Array(op.invert()),
        }
    }
}

// ── ObjectOp ──────────────────────────────────────────────────────────────

/// A structural operation on one property of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectOp {
    /// The identity operation.
    Nop,
    /// Creates a value at a path that had no prior value.
    Create { path: Path, val: Value },
    /// Removes the value at a path; `val` records the removed value.
    Delete { path: Path, val: Value },
    /// Applies a leaf op to the existing value at a path.
    Update { path: Path, diff: Diff },
    /// Replaces a value wholesale, recording both sides. `None` means
    /// "was unset" / "becomes unset".
    Set {
        path: Path,
        original: Option<Value>,
        val: Option<Value>,
    },
}

impl ObjectOp {
    pub fn create(path: Path, val: Value) -> Self {
        ObjectOp::Create { path, val }
    }

    pub fn delete(path: Path, val: Value) -> Self {
        ObjectOp::Delete { path, val }
    }

    pub fn update(path: Path, diff: Diff) -> Self {
        ObjectOp::Update { path, diff }
    }

    /// A Set replacing `original` with `val`.
    pub fn set(path: Path, original: Option<Value>, val: Option<Value>) -> Self {
        ObjectOp::Set {
            path,
            original,
            val,
        }
    }

    /// The operation name used in the canonical JSON form.
    pub fn kind(&self) -> &'static str {
        match self {
            ObjectOp::Nop => "NOP",
            ObjectOp::Create { .. } => "create",
            ObjectOp::Delete { .. } => "delete",
            ObjectOp::Update { .. } => "update",
            ObjectOp::Set { .. } => "set",
        }
    }

    /// The path this op addresses; `None` for NOP.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ObjectOp::Nop => None,
            ObjectOp::Create { path, .. }
            | ObjectOp::Delete { path, .. }
            | ObjectOp::Update { path, .. }
            | ObjectOp::Set { path, .. } => Some(path),
        }
    }

    /// True for the NOP variant and for an Update whose diff is a NOP.
    pub fn is_nop(&self) -> bool {
        match self {
            ObjectOp::Nop => true,
            ObjectOp::Update { diff, .. } => diff.is_nop(),
            _ => false,
        }
    }

    /// Construction-time invariants: every non-NOP op addresses a non-empty
    /// path. `from_json` enforces the rest (field presence, known tags).
    pub fn validate(&self) -> Result<(), MalformedOpError> {
        match self.path() {
            Some(path) if path.is_empty() => Err(MalformedOpError::EmptyPath),
            _ => Ok(()),
        }
    }

    /// The op that undoes this one when applied after it.
    pub fn invert(&self) -> ObjectOp {
        match self {
            ObjectOp::Nop => ObjectOp::Nop,
            ObjectOp::Create { path, val } => ObjectOp::Delete {
                path: path.clone(),
                val: val.clone(),
            },
            ObjectOp::Delete { path, val } => ObjectOp::Create {
                path: path.clone(),
                val: val.clone(),
            },
            ObjectOp::Update { path, diff } => ObjectOp::Update {
                path: path.clone(),
                diff: diff.invert(),
            },
            ObjectOp::Set {
                path,
                original,
                val,
            } => ObjectOp::Set {
                path: path.clone(),
                original: val.clone(),
                val: original.clone(),
            },
        }
    }
}

impl std::fmt::Display for ObjectOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectOp::Nop => write!(f, "NOP"),
            ObjectOp::Create { path, val } => write!(f, "create {} = {val}", format_path(path)),
            ObjectOp::Delete { path, .. } => write!(f, "delete {}", format_path(path)),
            ObjectOp::Update { path, diff } => match diff {
                Diff::Text(op) => write!(f, "update {} {op}", format_path(path)),
                Diff::Array(op) => write!(f, "update {} {op}", format_path(path)),
            },
            ObjectOp::Set { path, val, .. } => match val {
                Some(v) => write!(f, "set {} = {v}", format_path(path)),
                None => write!(f, "set {} = (unset)", format_path(path)),
            },
        }
    }
}
