//! Commit coordination for docsync documents.
//!
//! [`hub`] holds the server-side linearizer: one serial region per
//! document, a total-order change log, and the commit/rebase protocol.
//! [`session`] is the client-side state machine that mirrors a document
//! and keeps at most one commit in flight. [`wire`] defines the JSON tuple
//! messages exchanged between them; [`change_log`] is the binary layout
//! used to snapshot a hub's log.

use rand::Rng;

pub mod change_log;
pub mod hub;
pub mod session;
pub mod wire;

pub use hub::SessionId;

/// Generates a random non-zero session id for a new transport connection.
pub fn generate_session_id() -> SessionId {
    rand::thread_rng().gen_range(1..u64::MAX)
}

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
