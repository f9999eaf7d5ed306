//! Decode error types.
//!
//! All decode errors are fatal to the current parse operation and
//! propagate to the immediate caller; there is no internal retry, and no
//! partially populated output is guaranteed after an error.

use std::io;
use thiserror::Error;

/// Result type alias for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors raised while decoding wire-format input.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A varint ran past its maximum encoded length of ten bytes.
    #[error("encountered a malformed varint")]
    MalformedVarint,

    /// The input ended in the middle of a field, or a length-delimited
    /// field declared a length past the end of the available input. The
    /// declared length is never trusted for allocation, so oversized
    /// declarations fail here instead of exhausting memory.
    #[error("input ended unexpectedly in the middle of a field or declared length")]
    Truncated,

    /// A decoded tag carried field number zero.
    #[error("encountered a tag with field number zero")]
    InvalidTag,

    /// A tag carried wire-type bits that do not name a wire type.
    #[error("encountered a tag with unknown wire type {0}")]
    InvalidWireType(u32),

    /// An end-group tag did not match the group being parsed.
    #[error("encountered a mismatched end-group tag")]
    InvalidEndTag,

    /// Nested messages or groups exceeded the configured depth ceiling.
    /// This is the defense against adversarially deep nesting that would
    /// otherwise overflow the call stack.
    #[error("message nesting exceeded the recursion limit of {limit}")]
    RecursionLimitExceeded {
        /// The configured recursion limit.
        limit: u32,
    },

    /// Cumulative bytes consumed exceeded the configured size ceiling.
    #[error("input size exceeded the limit of {limit} bytes")]
    SizeLimitExceeded {
        /// The configured size limit.
        limit: usize,
    },

    /// The underlying stream source failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
