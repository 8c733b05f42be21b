//! OT on a linear character sequence.
//!
//! A [`TextOp`] inserts or deletes a run of characters at a char-based
//! offset. A delete records the removed text so the op inverts without
//! consulting the document. Positions count chars, not bytes.

use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextOpError {
    #[error("OUT_OF_BOUNDS")]
    OutOfBounds,
    #[error("TEXT_MISMATCH")]
    TextMismatch,
    #[error("INVALID_OP: {0}")]
    InvalidOp(String),
}

/// A single text operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOp {
    Insert { pos: usize, text: String },
    Delete { pos: usize, text: String },
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn splice_chars(target: &str, pos: usize, insert: &str) -> String {
    let chars: Vec<char> = target.chars().collect();
    let mut out = String::with_capacity(target.len() + insert.len());
    out.extend(&chars[..pos]);
    out.push_str(insert);
    out.extend(&chars[pos..]);
    out
}

impl TextOp {
    pub fn insert(pos: usize, text: impl Into<String>) -> Self {
        TextOp::Insert {
            pos,
            text: text.into(),
        }
    }

    pub fn delete(pos: usize, text: impl Into<String>) -> Self {
        TextOp::Delete {
            pos,
            text: text.into(),
        }
    }

    pub fn pos(&self) -> usize {
        match self {
            TextOp::Insert { pos, .. } | TextOp::Delete { pos, .. } => *pos,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            TextOp::Insert { text, .. } | TextOp::Delete { text, .. } => text,
        }
    }

    /// The number of chars this op inserts or removes.
    pub fn len(&self) -> usize {
        char_len(self.text())
    }

    pub fn is_nop(&self) -> bool {
        self.text().is_empty()
    }

    /// Applies the op to a string, with strict bounds checks.
    ///
    /// A delete additionally verifies that the recorded text matches the
    /// chars actually removed.
    pub fn apply(&self, target: &str) -> Result<String, TextOpError> {
        match self {
            TextOp::Insert { pos, text } => {
                if *pos > char_len(target) {
                    return Err(TextOpError::OutOfBounds);
                }
                Ok(splice_chars(target, *pos, text))
            }
            TextOp::Delete { pos, text } => {
                let chars: Vec<char> = target.chars().collect();
                let removed: Vec<char> = text.chars().collect();
                if pos + removed.len() > chars.len() {
                    return Err(TextOpError::OutOfBounds);
                }
                if chars[*pos..pos + removed.len()] != removed[..] {
                    return Err(TextOpError::TextMismatch);
                }
                let mut out = String::with_capacity(target.len());
                out.extend(&chars[..*pos]);
                out.extend(&chars[pos + removed.len()..]);
                Ok(out)
            }
        }
    }

    pub fn invert(&self) -> TextOp {
        match self {
            TextOp::Insert { pos, text } => TextOp::Delete {
                pos: *pos,
                text: text.clone(),
            },
            TextOp::Delete { pos, text } => TextOp::Insert {
                pos: *pos,
                text: text.clone(),
            },
        }
    }

    /// Merges two sequential ops into one when the result is still a single
    /// run: adjacent inserts, adjacent deletes. `second` applies after
    /// `self`. Returns `None` when the pair does not merge.
    pub fn compose(&self, second: &TextOp) -> Option<TextOp> {
        if self.is_nop() {
            return Some(second.clone());
        }
        if second.is_nop() {
            return Some(self.clone());
        }
        match (self, second) {
            (TextOp::Insert { pos: p1, text: t1 }, TextOp::Insert { pos: p2, text: t2 }) => {
                if *p2 >= *p1 && *p2 <= p1 + char_len(t1) {
                    Some(TextOp::Insert {
                        pos: *p1,
                        text: splice_chars(t1, p2 - p1, t2),
                    })
                } else {
                    None
                }
            }
            (TextOp::Delete { pos: p1, text: t1 }, TextOp::Delete { pos: p2, text: t2 }) => {
                if *p2 == *p1 {
                    Some(TextOp::Delete {
                        pos: *p1,
                        text: format!("{t1}{t2}"),
                    })
                } else if p2 + char_len(t2) == *p1 {
                    Some(TextOp::Delete {
                        pos: *p2,
                        text: format!("{t2}{t1}"),
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Transforms two concurrent ops against each other, cloning the inputs.
    pub fn transform(a: &TextOp, b: &TextOp) -> (TextOp, TextOp) {
        let mut a = a.clone();
        let mut b = b.clone();
        TextOp::transform_inplace(&mut a, &mut b);
        (a, b)
    }

    /// In-place variant of [`TextOp::transform`].
    ///
    /// Position ties between two inserts break in favor of `a`. An insert
    /// strictly inside a concurrent delete's range is swallowed: it becomes
    /// a NOP and the delete's recorded text absorbs the inserted run, which
    /// is the only single-op resolution that converges.
    pub fn transform_inplace(a: &mut TextOp, b: &mut TextOp) {
        if a.is_nop() || b.is_nop() {
            return;
        }
        match (a, b) {
            (
                TextOp::Insert { pos: a_pos, text: a_text },
                TextOp::Insert { pos: b_pos, text: b_text },
            ) => {
                if *a_pos <= *b_pos {
                    *b_pos += char_len(a_text);
                } else {
                    *a_pos += char_len(b_text);
                }
            }
            (
                TextOp::Insert { pos: a_pos, text: a_text },
                TextOp::Delete { pos: b_pos, text: b_text },
            ) => {
                transform_insert_delete(a_pos, a_text, b_pos, b_text);
            }
            (
                TextOp::Delete { pos: a_pos, text: a_text },
                TextOp::Insert { pos: b_pos, text: b_text },
            ) => {
                transform_insert_delete(b_pos, b_text, a_pos, a_text);
            }
            (
                TextOp::Delete { pos: a_pos, text: a_text },
                TextOp::Delete { pos: b_pos, text: b_text },
            ) => {
                let a_len = char_len(a_text);
                let b_len = char_len(b_text);
                if *a_pos + a_len <= *b_pos {
                    *b_pos -= a_len;
                } else if *b_pos + b_len <= *a_pos {
                    *a_pos -= b_len;
                } else {
                    let (na_pos, na_text) =
                        delete_remainder(*a_pos, a_text, *b_pos, *b_pos + b_len);
                    let (nb_pos, nb_text) =
                        delete_remainder(*b_pos, b_text, *a_pos, *a_pos + a_len);
                    *a_pos = na_pos;
                    *a_text = na_text;
                    *b_pos = nb_pos;
                    *b_text = nb_text;
                }
            }
        }
    }

    pub fn to_json(&self) -> Value {
        let (kind, pos, text) = match self {
            TextOp::Insert { pos, text } => ("insert", pos, text),
            TextOp::Delete { pos, text } => ("delete", pos, text),
        };
        json!({ "type": kind, "pos": pos, "str": text })
    }

    pub fn from_json(v: &Value) -> Result<TextOp, TextOpError> {
        let obj: &Map<String, Value> = v
            .as_object()
            .ok_or_else(|| TextOpError::InvalidOp("text op must be an object".into()))?;
        let kind = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TextOpError::InvalidOp("missing 'type'".into()))?;
        let pos = obj
            .get("pos")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| TextOpError::InvalidOp("missing 'pos'".into()))? as usize;
        let text = obj
            .get("str")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TextOpError::InvalidOp("missing 'str'".into()))?
            .to_string();
        match kind {
            "insert" => Ok(TextOp::Insert { pos, text }),
            "delete" => Ok(TextOp::Delete { pos, text }),
            other => Err(TextOpError::InvalidOp(format!("unknown type: {other}"))),
        }
    }
}

/// The insert/delete interaction, shared by both argument orders.
fn transform_insert_delete(
    ins_pos: &mut usize,
    ins_text: &mut String,
    del_pos: &mut usize,
    del_text: &mut String,
) {
    let ins_len = char_len(ins_text);
    let del_len = char_len(del_text);
    if *ins_pos <= *del_pos {
        *del_pos += ins_len;
    } else if *ins_pos >= *del_pos + del_len {
        *ins_pos -= del_len;
    } else {
        *del_text = splice_chars(del_text, *ins_pos - *del_pos, ins_text);
        *ins_pos = *del_pos;
        ins_text.clear();
    }
}

/// The part of an overlapping delete `[x_s, x_s+len)` that survives a
/// concurrent delete of `[y_s, y_e)`, positioned in post-`y` coordinates.
fn delete_remainder(x_s: usize, x_text: &str, y_s: usize, y_e: usize) -> (usize, String) {
    let chars: Vec<char> = x_text.chars().collect();
    let x_e = x_s + chars.len();
    let mut kept = String::new();
    if x_s < y_s {
        kept.extend(&chars[..y_s - x_s]);
    }
    if x_e > y_e {
        kept.extend(&chars[y_e - x_s..]);
    }
    let pos = if x_s < y_s { x_s } else { y_s };
    (pos, kept)
}

impl std::fmt::Display for TextOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextOp::Insert { pos, text } => write!(f, "ins {text:?} @{pos}"),
            TextOp::Delete { pos, text } => write!(f, "del {text:?} @{pos}"),
        }
    }
}
