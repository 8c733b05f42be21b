//! Pairwise transformation of concurrent structural operations.
//!
//! `transform(a, b)` rewrites two ops produced independently against the
//! same base state so that applying them in either order converges (TP1):
//! `a'.apply(b.apply(s)) == b'.apply(a.apply(s))`.
//!
//! Orientation decisions, fixed across both argument orders:
//! - Delete vs Update: the Delete wins. The Update side becomes NOP and the
//!   Delete's recorded `val` is rewritten to the post-update value so the
//!   delete stays invertible.
//! - Delete vs Set: the Set wins. The Delete side becomes NOP and the Set's
//!   `original` is cleared, since the state it now replaces is deletion.
//! - Set vs Set: `a` becomes NOP and `b.original` is rewritten to `a.val`;
//!   callers needing a different policy order their arguments.

use thiserror::Error;

use crate::array_op::ArrayOp;
use crate::text_op::TextOp;

use super::apply::ApplyError;
use super::types::{Diff, ObjectOp};

#[derive(Debug, Error)]
pub enum TransformError {
    /// Both ops touch the same path and the caller requested conflict
    /// detection. Carries both operands.
    #[error("conflict on shared path: {a} / {b}")]
    Conflict { a: Box<ObjectOp>, b: Box<ObjectOp> },
    /// The pair is structurally impossible between two correctly generated
    /// ops from the same base state.
    #[error("illegal transform: {0}")]
    Illegal(String),
}

/// Options for [`ObjectOp::transform`].
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// When set, any two non-NOP ops on the same path raise
    /// [`TransformError::Conflict`] instead of being transformed.
    pub no_conflict: bool,
}

impl ObjectOp {
    /// Transforms two concurrent ops against each other, cloning the
    /// inputs. For a fixed pair and orientation the result is a pure
    /// function of the inputs.
    pub fn transform(
        a: &ObjectOp,
        b: &ObjectOp,
        options: &TransformOptions,
    ) -> Result<(ObjectOp, ObjectOp), TransformError> {
        let mut a = a.clone();
        let mut b = b.clone();
        ObjectOp::transform_inplace(&mut a, &mut b, options)?;
        Ok((a, b))
    }

    /// In-place variant of [`ObjectOp::transform`].
    ///
    /// On error the operands are left in an unspecified state; callers
    /// transform throwaway clones and discard them on failure.
    pub fn transform_inplace(
        a: &mut ObjectOp,
        b: &mut ObjectOp,
        options: &TransformOptions,
    ) -> Result<(), TransformError> {
        if a.is_nop() || b.is_nop() {
            return Ok(());
        }
        // Ops on different paths are independent.
        if a.path() != b.path() {
            return Ok(());
        }
        if options.no_conflict {
            return Err(TransformError::Conflict {
                a: Box::new(a.clone()),
                b: Box::new(b.clone()),
            });
        }
        let owned_a = std::mem::replace(a, ObjectOp::Nop);
        let owned_b = std::mem::replace(b, ObjectOp::Nop);
        let (ta, tb) = transform_pair(owned_a, owned_b)?;
        *a = ta;
        *b = tb;
        Ok(())
    }
}

fn transform_pair(a: ObjectOp, b: ObjectOp) -> Result<(ObjectOp, ObjectOp), TransformError> {
    use ObjectOp::{Create, Delete, Set, Update};
    match (a, b) {
        // Two concurrent creates of one path imply it existed for neither
        // yet existed for both. Same for create against any other op, which
        // requires the path to already exist.
        (a @ Create { .. }, b) | (a, b @ Create { .. }) => Err(TransformError::Illegal(format!(
            "create cannot be concurrent with {} on the same path",
            if matches!(a, Create { .. }) { b.kind() } else { a.kind() },
        ))),

        // Both deleted the same value; either way the path ends up gone.
        (Delete { .. }, Delete { .. }) => Ok((ObjectOp::Nop, ObjectOp::Nop)),

        // Delete vs Update: delete wins, and must now remove the
        // post-update value.
        (Delete { path, val }, Update { diff, .. }) => {
            let val = updated_value(&diff, &val)?;
            Ok((Delete { path, val }, ObjectOp::Nop))
        }
        (Update { diff, .. }, Delete { path, val }) => {
            let val = updated_value(&diff, &val)?;
            Ok((ObjectOp::Nop, Delete { path, val }))
        }

        // Update vs Update delegates to the leaf algebra.
        (Update { path, diff: da }, Update { diff: db, .. }) => {
            let (da, db) = transform_diffs(da, db)?;
            let other = Update {
                path: path.clone(),
                diff: db,
            };
            Ok((Update { path, diff: da }, other))
        }

        // Delete vs Set: set wins. A Set to "unset" is itself a removal, so
        // against a Delete both sides collapse.
        (Delete { .. }, Set { path, val, .. }) => {
            if val.is_none() {
                Ok((ObjectOp::Nop, ObjectOp::Nop))
            } else {
                Ok((
                    ObjectOp::Nop,
                    Set {
                        path,
                        original: None,
                        val,
                    },
                ))
            }
        }
        (Set { path, val, .. }, Delete { .. }) => {
            if val.is_none() {
                Ok((ObjectOp::Nop, ObjectOp::Nop))
            } else {
                Ok((
                    Set {
                        path,
                        original: None,
                        val,
                    },
                    ObjectOp::Nop,
                ))
            }
        }

        // Set vs Set: b wins; its original is rewritten to record the state
        // a left behind.
        (Set { val: a_val, .. }, Set { path, val, .. }) => Ok((
            ObjectOp::Nop,
            Set {
                path,
                original: a_val,
                val,
            },
        )),

        (a @ Update { .. }, b @ Set { .. }) | (a @ Set { .. }, b @ Update { .. }) => {
            Err(TransformError::Illegal(format!(
                "{} cannot be concurrent with {} on the same path",
                a.kind(),
                b.kind(),
            )))
        }

        // NOPs were filtered by the caller.
        (a, b) => Err(TransformError::Illegal(format!(
            "unexpected pair: {} / {}",
            a.kind(),
            b.kind(),
        ))),
    }
}

fn transform_diffs(a: Diff, b: Diff) -> Result<(Diff, Diff), TransformError> {
    match (a, b) {
        (Diff::Text(mut x), Diff::Text(mut y)) => {
            TextOp::transform_inplace(&mut x, &mut y);
            Ok((Diff::Text(x), Diff::Text(y)))
        }
        (Diff::Array(mut x), Diff::Array(mut y)) => {
            ArrayOp::transform_inplace(&mut x, &mut y);
            Ok((Diff::Array(x), Diff::Array(y)))
        }
        (a, b) => Err(TransformError::Illegal(format!(
            "mismatched leaf op types on the same property: {} / {}",
            a.property_type(),
            b.property_type(),
        ))),
    }
}

/// The value a winning Delete must record after a concurrent Update: the
/// update applied to the previously recorded value.
fn updated_value(
    diff: &Diff,
    val: &serde_json::Value,
) -> Result<serde_json::Value, TransformError> {
    diff.apply_value(val).map_err(|err: ApplyError| {
        TransformError::Illegal(format!("update is not applicable to the deleted value: {err}"))
    })
}
