//! The server-side linearizer.
//!
//! A [`DocHub`] owns one document's serial region: the canonical document,
//! a monotonically increasing version counter, the total-order change log,
//! and the set of open sessions. Handlers are synchronous; each call
//! returns the full list of outbound messages, so transports stay a thin
//! shell around the hub. Between commits `version == 1 + changes.len()`
//! always holds.
//!
//! [`CollabServer`] routes sessions across many documents, each with its
//! own `DocHub`.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use docsync_ot::change::DocumentChange;
use docsync_ot::document::JsonDocument;
use docsync_ot::object_op::{ApplyError, MalformedOpError, TransformError, TransformOptions};

use crate::wire::{ClientMessage, ErrorCode, ServerMessage};

/// Identifies one transport connection to the hub.
pub type SessionId = u64;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("INVALID_VERSION: client at {client}, hub at {hub}")]
    InvalidVersion { client: u64, hub: u64 },
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
    #[error(transparent)]
    Malformed(#[from] MalformedOpError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl HubError {
    fn code(&self) -> ErrorCode {
        match self {
            HubError::InvalidVersion { .. } => ErrorCode::InvalidVersion,
            HubError::UnknownSession(_) => ErrorCode::UnknownSession,
            _ => ErrorCode::IllegalChange,
        }
    }
}

/// An outbound message addressed to one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: SessionId,
    pub msg: ServerMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionHandle {
    session: SessionId,
    client: String,
}

/// One document's serial region.
#[derive(Debug)]
pub struct DocHub {
    doc_id: String,
    version: u64,
    changes: Vec<DocumentChange>,
    document: JsonDocument,
    sessions: Vec<SessionHandle>,
}

impl DocHub {
    pub fn new(doc_id: impl Into<String>, initial: Value) -> Self {
        Self {
            doc_id: doc_id.into(),
            version: 1,
            changes: Vec::new(),
            document: JsonDocument::new(initial),
            sessions: Vec::new(),
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn changes(&self) -> &[DocumentChange] {
        &self.changes
    }

    pub fn document(&self) -> &Value {
        self.document.root()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Open sessions with the client identifier each was opened under.
    pub fn open_sessions(&self) -> impl Iterator<Item = (SessionId, &str)> {
        self.sessions
            .iter()
            .map(|handle| (handle.session, handle.client.as_str()))
    }

    /// Handles one inbound message. A failed commit or open never leaves a
    /// partial mutation behind: the sender gets an `["error", ...]` and is
    /// dropped from the open set, and hub state is exactly what it was.
    pub fn handle(&mut self, from: SessionId, client: &str, msg: ClientMessage) -> Vec<Outbound> {
        let result = match msg {
            ClientMessage::Open { version, .. } => self.open(from, client, version),
            ClientMessage::Commit { change, version } => self.commit(from, change, version),
            ClientMessage::Close { .. } => {
                self.drop_session(from);
                Ok(Vec::new())
            }
        };
        match result {
            Ok(out) => out,
            Err(err) => {
                self.drop_session(from);
                vec![Outbound {
                    to: from,
                    msg: ServerMessage::Error { code: err.code() },
                }]
            }
        }
    }

    fn open(
        &mut self,
        from: SessionId,
        client: &str,
        client_version: u64,
    ) -> Result<Vec<Outbound>, HubError> {
        if client_version == 0 || client_version > self.version {
            return Err(HubError::InvalidVersion {
                client: client_version,
                hub: self.version,
            });
        }
        // A client behind the hub catches up from the log it missed.
        let catchup = self.changes[(client_version - 1) as usize..].to_vec();
        self.drop_session(from);
        self.sessions.push(SessionHandle {
            session: from,
            client: client.to_string(),
        });
        Ok(vec![Outbound {
            to: from,
            msg: ServerMessage::OpenDone {
                version: self.version,
                catchup,
            },
        }])
    }

    fn commit(
        &mut self,
        from: SessionId,
        change: DocumentChange,
        client_version: u64,
    ) -> Result<Vec<Outbound>, HubError> {
        if !self.sessions.iter().any(|s| s.session == from) {
            return Err(HubError::UnknownSession(from));
        }
        change.validate()?;
        if client_version == 0 || client_version > self.version {
            return Err(HubError::InvalidVersion {
                client: client_version,
                hub: self.version,
            });
        }

        if client_version == self.version {
            // Fast path: the change already applies to the head.
            if change.is_nop() {
                return Ok(vec![Outbound {
                    to: from,
                    msg: ServerMessage::CommitDone {
                        version: self.version,
                        rebased: None,
                        catchup: Vec::new(),
                    },
                }]);
            }
            self.apply_committed(&change)?;
            let mut out = vec![Outbound {
                to: from,
                msg: ServerMessage::CommitDone {
                    version: self.version,
                    rebased: None,
                    catchup: Vec::new(),
                },
            }];
            self.broadcast(&mut out, from, &change);
            return Ok(out);
        }

        // Rebase path: transform the incoming change forward across every
        // commit the client has not seen. The missed clones come out the
        // other side transformed past the incoming change, which is exactly
        // the catch-up the client must apply locally.
        let mut missed: Vec<DocumentChange> =
            self.changes[(client_version - 1) as usize..].to_vec();
        let mut incoming = change;
        let options = TransformOptions::default();
        for committed in &mut missed {
            DocumentChange::transform(committed, &mut incoming, &options)?;
        }

        // A change NOP'd away entirely by the rebase (its targets are gone)
        // is acknowledged but not committed: nothing to apply, log, or
        // broadcast.
        if incoming.is_nop() {
            return Ok(vec![Outbound {
                to: from,
                msg: ServerMessage::CommitDone {
                    version: self.version,
                    rebased: Some(incoming),
                    catchup: missed,
                },
            }]);
        }

        self.apply_committed(&incoming)?;
        let mut out = vec![Outbound {
            to: from,
            msg: ServerMessage::CommitDone {
                version: self.version,
                rebased: Some(incoming.clone()),
                catchup: missed,
            },
        }];
        self.broadcast(&mut out, from, &incoming);
        Ok(out)
    }

    /// Applies a change to a throwaway copy of the document, then commits
    /// document, log, and version together. On error nothing is mutated.
    fn apply_committed(&mut self, change: &DocumentChange) -> Result<(), HubError> {
        let mut doc = self.document.clone();
        change.apply(&mut doc)?;
        self.document = doc;
        self.changes.push(change.clone());
        self.version += 1;
        Ok(())
    }

    fn broadcast(&self, out: &mut Vec<Outbound>, from: SessionId, change: &DocumentChange) {
        for handle in &self.sessions {
            if handle.session == from {
                continue;
            }
            out.push(Outbound {
                to: handle.session,
                msg: ServerMessage::Update {
                    version: self.version,
                    change: change.clone(),
                },
            });
        }
    }

    fn drop_session(&mut self, session: SessionId) {
        self.sessions.retain(|s| s.session != session);
    }
}

// ── Multi-document routing ────────────────────────────────────────────────

/// Routes sessions across documents; one [`DocHub`] per document id,
/// created lazily with an empty object root on first open.
#[derive(Debug, Default)]
pub struct CollabServer {
    hubs: HashMap<String, DocHub>,
    routes: HashMap<SessionId, String>,
}

impl CollabServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds a document; subsequent opens see this content.
    pub fn insert_document(&mut self, doc_id: impl Into<String>, initial: Value) {
        let doc_id = doc_id.into();
        self.hubs.insert(doc_id.clone(), DocHub::new(doc_id, initial));
    }

    pub fn hub(&self, doc_id: &str) -> Option<&DocHub> {
        self.hubs.get(doc_id)
    }

    pub fn handle(&mut self, from: SessionId, client: &str, msg: ClientMessage) -> Vec<Outbound> {
        match msg {
            ClientMessage::Open { ref doc_id, .. } => {
                let hub = self
                    .hubs
                    .entry(doc_id.clone())
                    .or_insert_with(|| DocHub::new(doc_id.clone(), Value::Object(Default::default())));
                self.routes.insert(from, doc_id.clone());
                hub.handle(from, client, msg)
            }
            ClientMessage::Close { .. } => {
                match self.routes.remove(&from) {
                    Some(doc_id) => match self.hubs.get_mut(&doc_id) {
                        Some(hub) => hub.handle(from, client, msg),
                        None => Vec::new(),
                    },
                    None => Vec::new(),
                }
            }
            ClientMessage::Commit { .. } => {
                let hub = self
                    .routes
                    .get(&from)
                    .and_then(|doc_id| self.hubs.get_mut(doc_id));
                match hub {
                    Some(hub) => hub.handle(from, client, msg),
                    None => vec![Outbound {
                        to: from,
                        msg: ServerMessage::Error {
                            code: ErrorCode::UnknownSession,
                        },
                    }],
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_ot::object_op::ObjectOp;
    use serde_json::json;

    fn p(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    fn open(hub: &mut DocHub, session: SessionId, client: &str, version: u64) -> Vec<Outbound> {
        hub.handle(
            session,
            client,
            ClientMessage::Open {
                doc_id: hub.doc_id().to_string(),
                version,
            },
        )
    }

    #[test]
    fn log_invariant_holds_across_commits() {
        let mut hub = DocHub::new("d", json!({}));
        open(&mut hub, 1, "a", 1);
        for i in 0..3 {
            let change = DocumentChange::new(vec![ObjectOp::create(
                p(&format!("k{i}")),
                json!(i),
            )]);
            hub.handle(
                1,
                "a",
                ClientMessage::Commit {
                    change,
                    version: hub.version(),
                },
            );
            assert_eq!(hub.version(), 1 + hub.changes().len() as u64);
        }
        assert_eq!(hub.version(), 4);
    }

    #[test]
    fn commit_from_unopened_session_errors() {
        let mut hub = DocHub::new("d", json!({}));
        let out = hub.handle(
            9,
            "x",
            ClientMessage::Commit {
                change: DocumentChange::new(vec![]),
                version: 1,
            },
        );
        assert_eq!(
            out,
            vec![Outbound {
                to: 9,
                msg: ServerMessage::Error {
                    code: ErrorCode::UnknownSession
                },
            }]
        );
    }

    #[test]
    fn version_ahead_of_hub_is_fatal() {
        let mut hub = DocHub::new("d", json!({}));
        open(&mut hub, 1, "a", 1);
        let out = hub.handle(
            1,
            "a",
            ClientMessage::Commit {
                change: DocumentChange::new(vec![]),
                version: 7,
            },
        );
        assert_eq!(
            out[0].msg,
            ServerMessage::Error {
                code: ErrorCode::InvalidVersion
            }
        );
        assert_eq!(hub.session_count(), 0);
    }

    #[test]
    fn failed_apply_rolls_back_everything() {
        let mut hub = DocHub::new("d", json!({}));
        open(&mut hub, 1, "a", 1);
        // Delete of an absent path fails mid-batch; the create before it
        // must not stick.
        let change = DocumentChange::new(vec![
            ObjectOp::create(p("ok"), json!(1)),
            ObjectOp::delete(p("missing"), json!(0)),
        ]);
        let out = hub.handle(1, "a", ClientMessage::Commit { change, version: 1 });
        assert_eq!(
            out[0].msg,
            ServerMessage::Error {
                code: ErrorCode::IllegalChange
            }
        );
        assert_eq!(hub.version(), 1);
        assert!(hub.changes().is_empty());
        assert_eq!(hub.document(), &json!({}));
    }

    #[test]
    fn malformed_change_is_rejected() {
        let mut hub = DocHub::new("d", json!({}));
        open(&mut hub, 1, "a", 1);
        let change = DocumentChange::new(vec![ObjectOp::create(vec![], json!(1))]);
        let out = hub.handle(1, "a", ClientMessage::Commit { change, version: 1 });
        assert_eq!(
            out[0].msg,
            ServerMessage::Error {
                code: ErrorCode::IllegalChange
            }
        );
        assert_eq!(hub.version(), 1);
    }

    #[test]
    fn sessions_are_tagged_with_client_ids() {
        let mut hub = DocHub::new("d", json!({}));
        open(&mut hub, 1, "alice", 1);
        open(&mut hub, 2, "bob", 1);
        // Reopening under the same session id replaces the handle.
        open(&mut hub, 1, "alice-laptop", 1);
        let mut seen: Vec<(SessionId, String)> = hub
            .open_sessions()
            .map(|(id, client)| (id, client.to_string()))
            .collect();
        seen.sort();
        assert_eq!(
            seen,
            vec![(1, "alice-laptop".to_string()), (2, "bob".to_string())]
        );
    }

    #[test]
    fn open_behind_hub_delivers_catchup() {
        let mut hub = DocHub::new("d", json!({}));
        open(&mut hub, 1, "a", 1);
        let change = DocumentChange::new(vec![ObjectOp::create(p("x"), json!(1))]);
        hub.handle(1, "a", ClientMessage::Commit { change: change.clone(), version: 1 });

        let out = open(&mut hub, 2, "b", 1);
        assert_eq!(
            out,
            vec![Outbound {
                to: 2,
                msg: ServerMessage::OpenDone {
                    version: 2,
                    catchup: vec![change],
                },
            }]
        );
    }

    #[test]
    fn server_routes_multiple_documents() {
        let mut server = CollabServer::new();
        server.insert_document("left", json!({"n": "l"}));
        server.insert_document("right", json!({"n": "r"}));

        server.handle(1, "a", ClientMessage::Open { doc_id: "left".into(), version: 1 });
        server.handle(2, "b", ClientMessage::Open { doc_id: "right".into(), version: 1 });

        let change = DocumentChange::new(vec![ObjectOp::set(
            p("n"),
            Some(json!("l")),
            Some(json!("L")),
        )]);
        server.handle(1, "a", ClientMessage::Commit { change, version: 1 });

        assert_eq!(server.hub("left").unwrap().document(), &json!({"n": "L"}));
        assert_eq!(server.hub("right").unwrap().document(), &json!({"n": "r"}));
    }
}
