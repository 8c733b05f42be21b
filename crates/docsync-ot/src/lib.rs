//! Core operation algebra for docsync.
//!
//! The crate is organized leaves-first: [`text_op`] and [`array_op`] are the
//! leaf OT algebras, [`object_op`] is the structural algebra over
//! path-addressed properties, and [`change`] batches object ops into one
//! logical edit. [`document`] provides the store the operations apply to.

pub mod array_op;
pub mod change;
pub mod document;
pub mod object_op;
pub mod path;
pub mod text_op;
pub mod value;

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
