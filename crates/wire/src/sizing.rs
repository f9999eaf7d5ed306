//! Serialized-size computation, decoupled from writing.
//!
//! Length-prefix framing writes a nested payload's size before the
//! payload itself, so sizes must be computable without writing. Every
//! function here returns exactly the number of bytes the corresponding
//! writer operation produces; that agreement is load-bearing and covered
//! by tests in the writer module.

use crate::tag::{Tag, WireType};
use crate::varint;

/// Size of a 64-bit varint value.
pub fn varint64(value: u64) -> usize {
    varint::varint64_len(value)
}

/// Size of a 32-bit varint value.
pub fn varint32(value: u32) -> usize {
    varint::varint32_len(value)
}

/// Size of a zigzag-encoded signed 32-bit value.
pub fn sint32(value: i32) -> usize {
    varint::varint32_len(varint::zigzag_encode32(value))
}

/// Size of a zigzag-encoded signed 64-bit value.
pub fn sint64(value: i64) -> usize {
    varint::varint64_len(varint::zigzag_encode64(value))
}

/// Size of a fixed 32-bit value.
pub fn fixed32() -> usize {
    4
}

/// Size of a fixed 64-bit value.
pub fn fixed64() -> usize {
    8
}

/// Size of a bool value.
pub fn bool() -> usize {
    1
}

/// Size of a field tag for the given field number. The wire type does not
/// affect the tag's length.
pub fn tag(field_number: u32) -> usize {
    varint::varint32_len(Tag::new(field_number, WireType::Varint).raw())
}

/// Size of a length-delimited payload: the length prefix plus the payload.
pub fn len_prefixed(payload_len: usize) -> usize {
    varint::varint64_len(payload_len as u64) + payload_len
}

/// Size of a complete length-delimited field: tag, length prefix, payload.
pub fn bytes_field(field_number: u32, payload_len: usize) -> usize {
    tag(field_number) + len_prefixed(payload_len)
}

/// Size of a complete varint field: tag plus value.
pub fn varint64_field(field_number: u32, value: u64) -> usize {
    tag(field_number) + varint64(value)
}

/// Size of a complete fixed32 field.
pub fn fixed32_field(field_number: u32) -> usize {
    tag(field_number) + fixed32()
}

/// Size of a complete fixed64 field.
pub fn fixed64_field(field_number: u32) -> usize {
    tag(field_number) + fixed64()
}

/// Size of a group field: start tag, contents, end tag.
pub fn group_field(field_number: u32, contents_len: usize) -> usize {
    2 * tag(field_number) + contents_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_size_grows_with_field_number() {
        assert_eq!(tag(1), 1);
        assert_eq!(tag(15), 1); // last single-byte tag
        assert_eq!(tag(16), 2);
        assert_eq!(tag(2047), 2);
        assert_eq!(tag(2048), 3);
    }

    #[test]
    fn test_len_prefixed() {
        assert_eq!(len_prefixed(0), 1);
        assert_eq!(len_prefixed(127), 128);
        assert_eq!(len_prefixed(128), 130);
    }

    #[test]
    fn test_field_sizes_compose() {
        assert_eq!(bytes_field(1, 5), 1 + 1 + 5);
        assert_eq!(varint64_field(16, 300), 2 + 2);
        assert_eq!(fixed32_field(1), 5);
        assert_eq!(fixed64_field(1), 9);
        assert_eq!(group_field(1, 10), 12);
    }
}
