//! Binary layout for a sequence of committed changes.
//!
//! Used to snapshot and restore a hub's change log: one format-version
//! byte, then per change a big-endian `u32` length prefix and the CBOR
//! encoding of the change's canonical JSON form. An empty log serializes
//! to zero bytes.

use std::io::Cursor;

use thiserror::Error;

use docsync_ot::change::DocumentChange;
use docsync_ot::object_op::MalformedOpError;

pub const CHANGE_LOG_VERSION: u8 = 1;
pub const MAX_CHANGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ChangeLogError {
    #[error("unsupported change log version: {0}")]
    UnsupportedVersion(u8),
    #[error("corrupt change log: truncated length header")]
    TruncatedLengthHeader,
    #[error("corrupt change log: change size {0} exceeds max")]
    ChangeTooLarge(usize),
    #[error("corrupt change log: truncated change data")]
    TruncatedChangeData,
    #[error("cbor encode failed: {0}")]
    Encode(String),
    #[error("cbor decode failed: {0}")]
    Decode(String),
    #[error(transparent)]
    Malformed(#[from] MalformedOpError),
}

fn encode_change(change: &DocumentChange) -> Result<Vec<u8>, ChangeLogError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&change.to_json(), &mut buf)
        .map_err(|err| ChangeLogError::Encode(err.to_string()))?;
    Ok(buf)
}

fn decode_change(data: &[u8]) -> Result<DocumentChange, ChangeLogError> {
    let value: serde_json::Value = ciborium::de::from_reader(Cursor::new(data))
        .map_err(|err| ChangeLogError::Decode(err.to_string()))?;
    Ok(DocumentChange::from_json(&value)?)
}

pub fn serialize_changes(changes: &[DocumentChange]) -> Result<Vec<u8>, ChangeLogError> {
    if changes.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = vec![CHANGE_LOG_VERSION];
    for change in changes {
        let bin = encode_change(change)?;
        out.extend_from_slice(&(bin.len() as u32).to_be_bytes());
        out.extend_from_slice(&bin);
    }
    Ok(out)
}

pub fn deserialize_changes(data: &[u8]) -> Result<Vec<DocumentChange>, ChangeLogError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let version = data[0];
    if version != CHANGE_LOG_VERSION {
        return Err(ChangeLogError::UnsupportedVersion(version));
    }

    let mut changes = Vec::new();
    let mut offset = 1usize;

    while offset < data.len() {
        if offset + 4 > data.len() {
            return Err(ChangeLogError::TruncatedLengthHeader);
        }
        let len = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        offset += 4;

        if len > MAX_CHANGE_SIZE {
            return Err(ChangeLogError::ChangeTooLarge(len));
        }
        if len > data.len().saturating_sub(offset) {
            return Err(ChangeLogError::TruncatedChangeData);
        }

        changes.push(decode_change(&data[offset..offset + len])?);
        offset += len;
    }

    Ok(changes)
}

pub fn append_change(existing: &[u8], change: &DocumentChange) -> Result<Vec<u8>, ChangeLogError> {
    let bin = encode_change(change)?;
    let mut out = Vec::with_capacity(existing.len().max(1) + 4 + bin.len());
    if existing.is_empty() {
        out.push(CHANGE_LOG_VERSION);
    } else {
        out.extend_from_slice(existing);
    }
    out.extend_from_slice(&(bin.len() as u32).to_be_bytes());
    out.extend_from_slice(&bin);
    Ok(out)
}
