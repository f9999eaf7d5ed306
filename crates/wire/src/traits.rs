//! The reading seam shared by both decoder backends.

use std::io::Read;

use filament_bytes::ByteSeq;

use crate::error::Result;
use crate::reader::WireReader;
use crate::stream::StreamReader;
use crate::tag::Tag;

/// Operations a field parser needs from a decoding cursor.
///
/// Implemented by [`WireReader`] (in-memory) and [`StreamReader`]
/// (streamed), so code that consumes fields — unknown-field capture,
/// extension decoding, message skipping — is written once against this
/// trait. The backend set is closed by design; the trait exists as a seam,
/// not as an open extension point.
pub trait WireRead {
    /// Read the next field tag, or `None` at a clean end of the current
    /// scope.
    fn read_tag(&mut self) -> Result<Option<Tag>>;

    /// Read a varint and keep its low 32 bits.
    fn read_varint32(&mut self) -> Result<u32>;

    /// Read a 64-bit varint.
    fn read_varint64(&mut self) -> Result<u64>;

    /// Read a little-endian fixed 32-bit value.
    fn read_fixed32(&mut self) -> Result<u32>;

    /// Read a little-endian fixed 64-bit value.
    fn read_fixed64(&mut self) -> Result<u64>;

    /// Read a length-delimited payload.
    fn read_bytes(&mut self) -> Result<ByteSeq>;

    /// Read a length-delimited string, substituting U+FFFD for invalid
    /// UTF-8.
    fn read_string(&mut self) -> Result<String>;

    /// Consume and discard the field the given tag introduces; `false`
    /// for an end-group tag.
    fn skip_field(&mut self, tag: Tag) -> Result<bool>;

    /// Mark entry into a nested message or group.
    fn enter_nested(&mut self) -> Result<()>;

    /// Mark exit from a nested message or group.
    fn leave_nested(&mut self);
}

impl<'a> WireRead for WireReader<'a> {
    fn read_tag(&mut self) -> Result<Option<Tag>> {
        WireReader::read_tag(self)
    }

    fn read_varint32(&mut self) -> Result<u32> {
        WireReader::read_varint32(self)
    }

    fn read_varint64(&mut self) -> Result<u64> {
        WireReader::read_varint64(self)
    }

    fn read_fixed32(&mut self) -> Result<u32> {
        WireReader::read_fixed32(self)
    }

    fn read_fixed64(&mut self) -> Result<u64> {
        WireReader::read_fixed64(self)
    }

    fn read_bytes(&mut self) -> Result<ByteSeq> {
        WireReader::read_bytes(self)
    }

    fn read_string(&mut self) -> Result<String> {
        WireReader::read_string(self)
    }

    fn skip_field(&mut self, tag: Tag) -> Result<bool> {
        WireReader::skip_field(self, tag)
    }

    fn enter_nested(&mut self) -> Result<()> {
        WireReader::enter_nested(self)
    }

    fn leave_nested(&mut self) {
        WireReader::leave_nested(self)
    }
}

impl<R: Read> WireRead for StreamReader<R> {
    fn read_tag(&mut self) -> Result<Option<Tag>> {
        StreamReader::read_tag(self)
    }

    fn read_varint32(&mut self) -> Result<u32> {
        StreamReader::read_varint32(self)
    }

    fn read_varint64(&mut self) -> Result<u64> {
        StreamReader::read_varint64(self)
    }

    fn read_fixed32(&mut self) -> Result<u32> {
        StreamReader::read_fixed32(self)
    }

    fn read_fixed64(&mut self) -> Result<u64> {
        StreamReader::read_fixed64(self)
    }

    fn read_bytes(&mut self) -> Result<ByteSeq> {
        StreamReader::read_bytes(self)
    }

    fn read_string(&mut self) -> Result<String> {
        StreamReader::read_string(self)
    }

    fn skip_field(&mut self, tag: Tag) -> Result<bool> {
        StreamReader::skip_field(self, tag)
    }

    fn enter_nested(&mut self) -> Result<()> {
        StreamReader::enter_nested(self)
    }

    fn leave_nested(&mut self) {
        StreamReader::leave_nested(self)
    }
}
