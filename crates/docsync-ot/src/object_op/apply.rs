//! Applying structural operations to a document store.

use serde_json::Value;
use thiserror::Error;

use crate::array_op::ArrayOpError;
use crate::document::{DocumentError, DocumentStore};
use crate::text_op::TextOpError;
use crate::value::deep_clone;

use super::types::{Diff, ObjectOp};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplyError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Text(#[from] TextOpError),
    #[error(transparent)]
    Array(#[from] ArrayOpError),
    #[error("property is not a {0}")]
    PropertyTypeMismatch(&'static str),
}

impl Diff {
    /// Applies the leaf op to a property value, producing the new value.
    pub fn apply_value(&self, target: &Value) -> Result<Value, ApplyError> {
        match self {
            Diff::Text(op) => {
                let text = target
                    .as_str()
                    .ok_or(ApplyError::PropertyTypeMismatch("string"))?;
                Ok(Value::String(op.apply(text)?))
            }
            Diff::Array(op) => Ok(op.apply(target)?),
        }
    }
}

impl ObjectOp {
    /// Applies the op to a document store.
    ///
    /// Every value handed to the store is a deep copy; the op's stored
    /// `val`/`original`/`diff` are never mutated. A Create whose path is
    /// already present overwrites the existing value.
    pub fn apply<S: DocumentStore + ?Sized>(&self, store: &mut S) -> Result<(), ApplyError> {
        match self {
            ObjectOp::Nop => Ok(()),
            ObjectOp::Create { path, val } => {
                store.set(path, deep_clone(val))?;
                Ok(())
            }
            ObjectOp::Delete { path, .. } => {
                store.delete(path)?;
                Ok(())
            }
            ObjectOp::Update { path, diff } => {
                let old = store.get(path).ok_or(DocumentError::NotFound)?;
                let new = diff.apply_value(old)?;
                store.set(path, new)?;
                Ok(())
            }
            ObjectOp::Set { path, val, .. } => match val {
                Some(v) => {
                    store.set(path, deep_clone(v))?;
                    Ok(())
                }
                None => {
                    store.delete(path)?;
                    Ok(())
                }
            },
        }
    }
}
