//! JSON tuple messages exchanged between sessions and the hub.
//!
//! Every message is a JSON array with a string tag as element 0:
//!
//! ```text
//! client -> hub   ["open", docId, version]
//!                 ["commit", change, version]
//!                 ["close", docId]
//! hub -> client   ["openDone", version, catchup?]
//!                 ["commitDone", version]
//!                 ["commitDone", version, rebased, catchup]
//!                 ["update", version, change]
//!                 ["error", code]
//! ```
//!
//! The transport frames these however it likes; this module only defines
//! the tuples.

use serde_json::{json, Value};
use thiserror::Error;

use docsync_ot::change::DocumentChange;
use docsync_ot::object_op::MalformedOpError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WireError {
    #[error("message must be a non-empty array")]
    NotATuple,
    #[error("unknown message tag: {0}")]
    UnknownTag(String),
    #[error("malformed '{tag}' message: {reason}")]
    BadPayload { tag: &'static str, reason: String },
    #[error(transparent)]
    Malformed(#[from] MalformedOpError),
}

/// Fatal protocol errors reported to a session before it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The client claimed a version ahead of the hub.
    InvalidVersion,
    /// The client's change was malformed, not applicable, or structurally
    /// impossible to transform.
    IllegalChange,
    /// The hub has no open session for the sender.
    UnknownSession,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidVersion => "invalidVersion",
            ErrorCode::IllegalChange => "illegalChange",
            ErrorCode::UnknownSession => "unknownSession",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, WireError> {
        match s {
            "invalidVersion" => Ok(ErrorCode::InvalidVersion),
            "illegalChange" => Ok(ErrorCode::IllegalChange),
            "unknownSession" => Ok(ErrorCode::UnknownSession),
            other => Err(WireError::BadPayload {
                tag: "error",
                reason: format!("unknown code: {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Open { doc_id: String, version: u64 },
    Commit { change: DocumentChange, version: u64 },
    Close { doc_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    OpenDone {
        version: u64,
        catchup: Vec<DocumentChange>,
    },
    CommitDone {
        version: u64,
        rebased: Option<DocumentChange>,
        catchup: Vec<DocumentChange>,
    },
    Update {
        version: u64,
        change: DocumentChange,
    },
    Error {
        code: ErrorCode,
    },
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn tuple(v: &Value) -> Result<(&str, &[Value]), WireError> {
    let items = v.as_array().ok_or(WireError::NotATuple)?;
    let tag = items
        .first()
        .and_then(|t| t.as_str())
        .ok_or(WireError::NotATuple)?;
    Ok((tag, &items[1..]))
}

fn need_u64(args: &[Value], idx: usize, tag: &'static str) -> Result<u64, WireError> {
    args.get(idx)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| WireError::BadPayload {
            tag,
            reason: format!("argument {idx} must be an unsigned integer"),
        })
}

fn need_str<'a>(args: &'a [Value], idx: usize, tag: &'static str) -> Result<&'a str, WireError> {
    args.get(idx)
        .and_then(|v| v.as_str())
        .ok_or_else(|| WireError::BadPayload {
            tag,
            reason: format!("argument {idx} must be a string"),
        })
}

fn need_change(args: &[Value], idx: usize, tag: &'static str) -> Result<DocumentChange, WireError> {
    let v = args.get(idx).ok_or_else(|| WireError::BadPayload {
        tag,
        reason: format!("argument {idx} missing"),
    })?;
    Ok(DocumentChange::from_json(v)?)
}

fn decode_changes(v: &Value, tag: &'static str) -> Result<Vec<DocumentChange>, WireError> {
    let items = v.as_array().ok_or_else(|| WireError::BadPayload {
        tag,
        reason: "catchup must be an array".into(),
    })?;
    items
        .iter()
        .map(|c| DocumentChange::from_json(c).map_err(WireError::from))
        .collect()
}

fn encode_changes(changes: &[DocumentChange]) -> Value {
    Value::Array(changes.iter().map(DocumentChange::to_json).collect())
}

// ── Codec ─────────────────────────────────────────────────────────────────

impl ClientMessage {
    pub fn to_json(&self) -> Value {
        match self {
            ClientMessage::Open { doc_id, version } => json!(["open", doc_id, version]),
            ClientMessage::Commit { change, version } => {
                json!(["commit", change.to_json(), version])
            }
            ClientMessage::Close { doc_id } => json!(["close", doc_id]),
        }
    }

    pub fn from_json(v: &Value) -> Result<ClientMessage, WireError> {
        let (tag, args) = tuple(v)?;
        match tag {
            "open" => Ok(ClientMessage::Open {
                doc_id: need_str(args, 0, "open")?.to_string(),
                version: need_u64(args, 1, "open")?,
            }),
            "commit" => Ok(ClientMessage::Commit {
                change: need_change(args, 0, "commit")?,
                version: need_u64(args, 1, "commit")?,
            }),
            "close" => Ok(ClientMessage::Close {
                doc_id: need_str(args, 0, "close")?.to_string(),
            }),
            other => Err(WireError::UnknownTag(other.to_string())),
        }
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Value {
        match self {
            ServerMessage::OpenDone { version, catchup } => {
                if catchup.is_empty() {
                    json!(["openDone", version])
                } else {
                    json!(["openDone", version, encode_changes(catchup)])
                }
            }
            ServerMessage::CommitDone {
                version,
                rebased,
                catchup,
            } => match rebased {
                None => json!(["commitDone", version]),
                Some(change) => json!([
                    "commitDone",
                    version,
                    change.to_json(),
                    encode_changes(catchup)
                ]),
            },
            ServerMessage::Update { version, change } => {
                json!(["update", version, change.to_json()])
            }
            ServerMessage::Error { code } => json!(["error", code.as_str()]),
        }
    }

    pub fn from_json(v: &Value) -> Result<ServerMessage, WireError> {
        let (tag, args) = tuple(v)?;
        match tag {
            "openDone" => Ok(ServerMessage::OpenDone {
                version: need_u64(args, 0, "openDone")?,
                catchup: match args.get(1) {
                    None => Vec::new(),
                    Some(c) => decode_changes(c, "openDone")?,
                },
            }),
            "commitDone" => {
                let version = need_u64(args, 0, "commitDone")?;
                match args.get(1) {
                    None => Ok(ServerMessage::CommitDone {
                        version,
                        rebased: None,
                        catchup: Vec::new(),
                    }),
                    Some(rebased) => Ok(ServerMessage::CommitDone {
                        version,
                        rebased: Some(DocumentChange::from_json(rebased)?),
                        catchup: match args.get(2) {
                            None => Vec::new(),
                            Some(c) => decode_changes(c, "commitDone")?,
                        },
                    }),
                }
            }
            "update" => Ok(ServerMessage::Update {
                version: need_u64(args, 0, "update")?,
                change: need_change(args, 1, "update")?,
            }),
            "error" => Ok(ServerMessage::Error {
                code: ErrorCode::from_str(need_str(args, 0, "error")?)?,
            }),
            other => Err(WireError::UnknownTag(other.to_string())),
        }
    }
}
