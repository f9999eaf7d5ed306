//! Field tags: `(field_number << 3) | wire_type`.

use crate::error::{DecodeError, Result};

/// Number of low bits in a tag that carry the wire type.
pub const TAG_TYPE_BITS: u32 = 3;

/// Largest legal field number (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// How a field's payload is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer.
    Varint = 0,
    /// Eight bytes, little-endian.
    Fixed64 = 1,
    /// Varint length prefix followed by that many raw bytes.
    LengthDelimited = 2,
    /// Opens a group; closed by a matching [`WireType::EndGroup`] tag.
    StartGroup = 3,
    /// Closes the innermost open group.
    EndGroup = 4,
    /// Four bytes, little-endian.
    Fixed32 = 5,
}

impl WireType {
    /// Decode the low three bits of a tag into a wire type.
    pub fn from_bits(bits: u32) -> Result<WireType> {
        match bits & 0x7 {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::Fixed32),
            bits => Err(DecodeError::InvalidWireType(bits)),
        }
    }
}

/// A decoded field tag: field number plus wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    field_number: u32,
    wire_type: WireType,
}

impl Tag {
    /// Build a tag.
    ///
    /// # Panics
    ///
    /// Panics if `field_number` is zero or exceeds [`MAX_FIELD_NUMBER`];
    /// those values cannot be represented on the wire.
    pub fn new(field_number: u32, wire_type: WireType) -> Tag {
        assert!(
            (1..=MAX_FIELD_NUMBER).contains(&field_number),
            "field number {field_number} out of range"
        );
        Tag {
            field_number,
            wire_type,
        }
    }

    /// Decode a raw tag value read off the wire.
    ///
    /// Fails with [`DecodeError::InvalidTag`] on field number zero and
    /// [`DecodeError::InvalidWireType`] on wire-type bits 6 or 7.
    pub fn from_raw(raw: u32) -> Result<Tag> {
        let field_number = raw >> TAG_TYPE_BITS;
        if field_number == 0 {
            return Err(DecodeError::InvalidTag);
        }
        Ok(Tag {
            field_number,
            wire_type: WireType::from_bits(raw)?,
        })
    }

    /// The field number.
    pub fn field_number(self) -> u32 {
        self.field_number
    }

    /// The wire type.
    pub fn wire_type(self) -> WireType {
        self.wire_type
    }

    /// The raw on-wire value: `(field_number << 3) | wire_type`.
    pub fn raw(self) -> u32 {
        (self.field_number << TAG_TYPE_BITS) | self.wire_type as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for field in [1u32, 2, 15, 16, 2047, 2048, MAX_FIELD_NUMBER] {
            for wt in [
                WireType::Varint,
                WireType::Fixed64,
                WireType::LengthDelimited,
                WireType::StartGroup,
                WireType::EndGroup,
                WireType::Fixed32,
            ] {
                let tag = Tag::new(field, wt);
                let back = Tag::from_raw(tag.raw()).unwrap();
                assert_eq!(back, tag);
                assert_eq!(back.field_number(), field);
                assert_eq!(back.wire_type(), wt);
            }
        }
    }

    #[test]
    fn test_field_number_zero_rejected() {
        assert!(matches!(Tag::from_raw(0), Err(DecodeError::InvalidTag)));
        assert!(matches!(
            Tag::from_raw(WireType::Varint as u32),
            Err(DecodeError::InvalidTag)
        ));
    }

    #[test]
    fn test_unknown_wire_type_rejected() {
        assert!(matches!(
            Tag::from_raw((1 << TAG_TYPE_BITS) | 6),
            Err(DecodeError::InvalidWireType(6))
        ));
        assert!(matches!(
            Tag::from_raw((1 << TAG_TYPE_BITS) | 7),
            Err(DecodeError::InvalidWireType(7))
        ));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_field_number_too_large_panics() {
        Tag::new(MAX_FIELD_NUMBER + 1, WireType::Varint);
    }

    #[test]
    fn test_known_raw_values() {
        assert_eq!(Tag::new(1, WireType::Varint).raw(), 0x08);
        assert_eq!(Tag::new(1, WireType::LengthDelimited).raw(), 0x0A);
        assert_eq!(Tag::new(2, WireType::Fixed32).raw(), 0x15);
    }
}
