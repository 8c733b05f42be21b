//! The client-side session state machine.
//!
//! A [`ClientSession`] mirrors one document and keeps at most one commit
//! in flight: `Closed -> Opening -> Synced <-> Committing -> Closed`.
//! Local edits made while a commit is outstanding are applied to the
//! mirror immediately and buffered; when the in-flight commit resolves
//! they are rebased across the server's catch-up and committed next.

use std::collections::VecDeque;

use serde_json::Value;
use thiserror::Error;

use docsync_ot::change::DocumentChange;
use docsync_ot::document::JsonDocument;
use docsync_ot::object_op::{ApplyError, TransformError, TransformOptions};

use crate::wire::{ClientMessage, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Closed,
    Opening,
    Synced,
    Committing,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation not allowed while {status:?}")]
    InvalidState { status: SessionStatus },
    #[error("unexpected {tag} message while {status:?}")]
    UnexpectedMessage {
        tag: &'static str,
        status: SessionStatus,
    },
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Per-client state for one open document.
#[derive(Debug)]
pub struct ClientSession {
    doc_id: String,
    status: SessionStatus,
    last_known_version: u64,
    document: JsonDocument,
    /// The change sent to the hub and not yet acknowledged.
    pending: Option<DocumentChange>,
    /// Local edits made while `pending` was in flight, already applied to
    /// the mirror, not yet sent.
    buffered: VecDeque<DocumentChange>,
    /// Updates received while committing, resolved at `commitDone`.
    queued_updates: Vec<(u64, DocumentChange)>,
}

impl ClientSession {
    /// A session over a base snapshot of the document at `version`.
    ///
    /// The snapshot comes from wherever the application stores documents;
    /// the protocol itself only ships changes.
    pub fn new(doc_id: impl Into<String>, base: Value, version: u64) -> Self {
        Self {
            doc_id: doc_id.into(),
            status: SessionStatus::Closed,
            last_known_version: version,
            document: JsonDocument::new(base),
            pending: None,
            buffered: VecDeque::new(),
            queued_updates: Vec::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn last_known_version(&self) -> u64 {
        self.last_known_version
    }

    pub fn document(&self) -> &Value {
        self.document.root()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some() || !self.buffered.is_empty()
    }

    /// Starts the session. Returns the `open` message to send.
    pub fn open(&mut self) -> Result<ClientMessage, SessionError> {
        if self.status != SessionStatus::Closed {
            return Err(SessionError::InvalidState {
                status: self.status,
            });
        }
        self.status = SessionStatus::Opening;
        self.pending = None;
        self.buffered.clear();
        self.queued_updates.clear();
        Ok(ClientMessage::Open {
            doc_id: self.doc_id.clone(),
            version: self.last_known_version,
        })
    }

    /// Ends the session. Returns the `close` message to send.
    pub fn close(&mut self) -> ClientMessage {
        self.status = SessionStatus::Closed;
        ClientMessage::Close {
            doc_id: self.doc_id.clone(),
        }
    }

    /// Records a local edit. The change is applied to the mirror
    /// immediately; the returned `commit` message, when present, must be
    /// sent to the hub. While a commit is already in flight the edit is
    /// buffered instead and `None` is returned.
    pub fn local_change(
        &mut self,
        change: DocumentChange,
    ) -> Result<Option<ClientMessage>, SessionError> {
        match self.status {
            SessionStatus::Synced => {
                change.apply(&mut self.document)?;
                self.pending = Some(change.clone());
                self.status = SessionStatus::Committing;
                Ok(Some(ClientMessage::Commit {
                    change,
                    version: self.last_known_version,
                }))
            }
            SessionStatus::Committing => {
                change.apply(&mut self.document)?;
                self.buffered.push_back(change);
                Ok(None)
            }
            status => Err(SessionError::InvalidState { status }),
        }
    }

    /// Handles one message from the hub, returning any messages to send
    /// back (the next buffered commit, if one became eligible).
    pub fn handle(&mut self, msg: ServerMessage) -> Result<Vec<ClientMessage>, SessionError> {
        match msg {
            ServerMessage::OpenDone { version, catchup } => {
                if self.status != SessionStatus::Opening {
                    return Err(SessionError::UnexpectedMessage {
                        tag: "openDone",
                        status: self.status,
                    });
                }
                for change in &catchup {
                    change.apply(&mut self.document)?;
                }
                self.last_known_version = version;
                self.status = SessionStatus::Synced;
                Ok(Vec::new())
            }
            ServerMessage::Update { version, change } => match self.status {
                SessionStatus::Synced => {
                    change.apply(&mut self.document)?;
                    self.last_known_version = version;
                    Ok(Vec::new())
                }
                SessionStatus::Committing => {
                    self.queued_updates.push((version, change));
                    Ok(Vec::new())
                }
                status => Err(SessionError::UnexpectedMessage {
                    tag: "update",
                    status,
                }),
            },
            ServerMessage::CommitDone {
                version,
                rebased: _,
                catchup,
            } => self.commit_done(version, catchup),
            ServerMessage::Error { .. } => {
                self.status = SessionStatus::Closed;
                Ok(Vec::new())
            }
        }
    }

    fn commit_done(
        &mut self,
        version: u64,
        mut catchup: Vec<DocumentChange>,
    ) -> Result<Vec<ClientMessage>, SessionError> {
        if self.status != SessionStatus::Committing {
            return Err(SessionError::UnexpectedMessage {
                tag: "commitDone",
                status: self.status,
            });
        }

        // The catch-up is already transformed past the acknowledged change;
        // rebase it across the edits buffered since, and those edits across
        // it, so both end up relative to the new head.
        let options = TransformOptions::default();
        for change in &mut catchup {
            for local in self.buffered.iter_mut() {
                DocumentChange::transform(change, local, &options)?;
            }
            change.apply(&mut self.document)?;
        }
        self.pending = None;
        self.last_known_version = version;

        // Queued updates at or below the acknowledged version are the same
        // commits the catch-up just covered; drop them. Anything newer is
        // applied directly (the mirror now matches the hub head).
        let queued = std::mem::take(&mut self.queued_updates);
        for (update_version, change) in queued {
            if update_version <= version {
                continue;
            }
            change.apply(&mut self.document)?;
            self.last_known_version = update_version;
        }

        match self.buffered.pop_front() {
            Some(next) => {
                self.pending = Some(next.clone());
                Ok(vec![ClientMessage::Commit {
                    change: next,
                    version: self.last_known_version,
                }])
            }
            None => {
                self.status = SessionStatus::Synced;
                Ok(Vec::new())
            }
        }
    }
}
