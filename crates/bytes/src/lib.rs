//! Immutable byte sequences for wire-format serialization
//!
//! This crate provides [`ByteSeq`], an immutable, cheaply clonable byte
//! container with three representations behind one handle:
//!
//! - a flat contiguous array (optionally a sub-range view of shared storage)
//! - a wrap around externally owned memory (zero-copy)
//! - a concatenation tree (rope) of two child sequences
//!
//! Concatenation is O(1) amortized and never copies large operands,
//! substring is O(log n), and equality/hashing are structural: two
//! sequences with the same bytes compare equal and hash identically no
//! matter how their internal trees are shaped.
//!
//! The crate also provides a resumable UTF-8 validator ([`utf8`]) whose
//! verdict is identical whether it runs over a flat buffer, a sub-range
//! view, or rope chunks, and a sequential reader ([`SeqReader`]) that
//! streams a rope's bytes without flattening it first.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod rope;

pub mod read;
pub mod seq;
pub mod utf8;

pub use read::SeqReader;
pub use seq::{ByteSeq, Leaves};
pub use utf8::Utf8State;
