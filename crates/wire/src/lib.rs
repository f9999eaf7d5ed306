//! Binary wire-format codec
//!
//! This crate implements the length-prefixed binary wire format: varint
//! and zigzag integer coding, little-endian fixed-width values, tag
//! framing (`(field_number << 3) | wire_type`), and length-delimited
//! nesting — together with the defensive decoding machinery production
//! parsers need against malicious input: a nesting limit stack, a
//! recursion-depth ceiling, and a cumulative size ceiling.
//!
//! Decoding is offered over two sources:
//!
//! - [`WireReader`]: a cursor over in-memory bytes
//! - [`StreamReader`]: a buffered cursor over any [`std::io::Read`],
//!   performing blocking refills on the calling thread
//!
//! Encoding mirrors that split with [`WireWriter`] (growable buffer) and
//! [`StreamWriter`] (buffered sink with an explicit `flush`). The
//! [`sizing`] module computes serialized sizes without writing; every
//! write advances exactly the size the corresponding function reports,
//! which is what length-prefix framing of nested messages depends on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod reader;
pub mod sizing;
pub mod stream;
pub mod tag;
pub mod traits;
pub mod varint;
pub mod writer;

pub use error::{DecodeError, Result};
pub use limits::DecodeLimits;
pub use reader::{PrevLimit, WireReader};
pub use stream::StreamReader;
pub use tag::{Tag, WireType, MAX_FIELD_NUMBER};
pub use traits::WireRead;
pub use writer::{StreamWriter, WireWriter};
