//! Property paths.
//!
//! A path is an ordered sequence of string segments addressing a property in
//! the document tree. Paths are values: constructed once, compared
//! segment-wise, never mutated. The pointer-string form (`/a/b`) uses
//! RFC 6901 escaping and appears in rendered output and diagnostics; the
//! canonical JSON form of an operation carries the segment array itself.

use thiserror::Error;

/// An ordered sequence of property-name segments.
pub type Path = Vec<String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("POINTER_INVALID")]
    PointerInvalid,
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Formats a path as a pointer string, e.g. `["a", "b/c"]` -> `"/a/b~1c"`.
pub fn format_path(path: &[String]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(path.len() * 8);
    for segment in path {
        out.push('/');
        out.push_str(&escape_segment(segment));
    }
    out
}

/// Parses a pointer string into a path.
///
/// The empty string parses to the empty path; any other pointer must begin
/// with `/`.
pub fn parse_path(pointer: &str) -> Result<Path, PathError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let rest = pointer.strip_prefix('/').ok_or(PathError::PointerInvalid)?;
    Ok(rest.split('/').map(unescape_segment).collect())
}
