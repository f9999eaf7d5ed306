//! Decoding cursor over in-memory bytes.

use byteorder::{ByteOrder, LittleEndian};
use filament_bytes::ByteSeq;
use tracing::warn;

use crate::error::{DecodeError, Result};
use crate::limits::DecodeLimits;
use crate::tag::{Tag, WireType};
use crate::varint;

/// Token returned by [`WireReader::push_limit`], carrying the limit it
/// replaced. Passing it back to [`WireReader::pop_limit`] restores the
/// enclosing scope; tokens must be popped in the reverse of push order,
/// which falls out naturally when each nested parse keeps its token on
/// the call stack.
#[derive(Debug, Clone, Copy)]
#[must_use = "the previous limit must be restored with pop_limit"]
pub struct PrevLimit(pub(crate) usize);

/// A decoding cursor over a byte slice.
///
/// The reader tracks three defenses against malformed or malicious input:
/// a limit for the innermost length-delimited scope (see
/// [`WireReader::push_limit`]), a recursion-depth ceiling for nested
/// messages and groups, and a cumulative size ceiling. All three are
/// configured per reader through [`DecodeLimits`].
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Absolute position the current scope must not read past.
    current_limit: usize,
    recursion_depth: u32,
    limits: DecodeLimits,
    /// Position at the last size-counter reset; consumption is measured
    /// from here against `limits.size_limit`.
    size_base: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader over `buf` with default limits.
    pub fn new(buf: &'a [u8]) -> WireReader<'a> {
        WireReader::with_limits(buf, DecodeLimits::default())
    }

    /// Create a reader over `buf` with explicit limits.
    pub fn with_limits(buf: &'a [u8], limits: DecodeLimits) -> WireReader<'a> {
        WireReader {
            buf,
            pos: 0,
            current_limit: buf.len(),
            recursion_depth: 0,
            limits,
            size_base: 0,
        }
    }

    /// Absolute position from the start of the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the cursor has reached the innermost active limit (or the
    /// end of input when no limit is pushed).
    pub fn is_at_end(&self) -> bool {
        self.pos == self.current_limit
    }

    /// Bytes remaining before the innermost active limit.
    pub fn bytes_until_limit(&self) -> usize {
        self.current_limit - self.pos
    }

    /// Restart the cumulative size counter, for callers that decode many
    /// independent messages from one input.
    pub fn reset_size_counter(&mut self) {
        self.size_base = self.pos;
    }

    /// Establish a ceiling `len` bytes past the current position, bounding
    /// a nested length-delimited scope to its declared length.
    ///
    /// Fails with [`DecodeError::Truncated`] if the declared length runs
    /// past the enclosing scope — an untrusted length never causes an
    /// allocation or a read past real input.
    pub fn push_limit(&mut self, len: usize) -> Result<PrevLimit> {
        let new_limit = self
            .pos
            .checked_add(len)
            .ok_or(DecodeError::Truncated)?;
        if new_limit > self.current_limit {
            return Err(DecodeError::Truncated);
        }
        let prev = PrevLimit(self.current_limit);
        self.current_limit = new_limit;
        Ok(prev)
    }

    /// Restore the limit that was active before the matching
    /// [`WireReader::push_limit`]. The reader enforces only the hard
    /// ceiling; callers decide whether stopping short of the limit is an
    /// error by checking [`WireReader::is_at_end`] first.
    pub fn pop_limit(&mut self, prev: PrevLimit) {
        self.current_limit = prev.0;
    }

    /// Mark entry into a nested message or group.
    pub fn enter_nested(&mut self) -> Result<()> {
        if self.recursion_depth >= self.limits.recursion_limit {
            return Err(DecodeError::RecursionLimitExceeded {
                limit: self.limits.recursion_limit,
            });
        }
        self.recursion_depth += 1;
        Ok(())
    }

    /// Mark exit from a nested message or group.
    pub fn leave_nested(&mut self) {
        debug_assert!(self.recursion_depth > 0);
        self.recursion_depth = self.recursion_depth.saturating_sub(1);
    }

    fn check_size_limit(&self, additional: usize) -> Result<()> {
        let consumed = self.pos - self.size_base;
        if consumed + additional > self.limits.size_limit {
            warn!(
                limit = self.limits.size_limit,
                consumed,
                additional,
                "decode size limit exceeded"
            );
            return Err(DecodeError::SizeLimitExceeded {
                limit: self.limits.size_limit,
            });
        }
        Ok(())
    }

    /// The unread bytes of the current scope.
    fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..self.current_limit]
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        if self.bytes_until_limit() < n {
            return Err(DecodeError::Truncated);
        }
        self.check_size_limit(n)?;
        self.pos += n;
        Ok(())
    }

    /// Read the next field tag.
    ///
    /// Returns `Ok(None)` at a clean end of the current scope — the "no
    /// more fields" condition, distinct from an in-band field number 0,
    /// which is an error.
    pub fn read_tag(&mut self) -> Result<Option<Tag>> {
        if self.is_at_end() {
            return Ok(None);
        }
        let raw = self.read_varint32()?;
        Tag::from_raw(raw).map(Some)
    }

    /// Read a varint and keep its low 32 bits.
    pub fn read_varint32(&mut self) -> Result<u32> {
        let (value, consumed) = varint::decode_varint32(self.remaining())?;
        self.advance(consumed)?;
        Ok(value)
    }

    /// Read a 64-bit varint.
    pub fn read_varint64(&mut self) -> Result<u64> {
        let (value, consumed) = varint::decode_varint64(self.remaining())?;
        self.advance(consumed)?;
        Ok(value)
    }

    /// Read a zigzag-encoded signed 32-bit value.
    pub fn read_sint32(&mut self) -> Result<i32> {
        Ok(varint::zigzag_decode32(self.read_varint32()?))
    }

    /// Read a zigzag-encoded signed 64-bit value.
    pub fn read_sint64(&mut self) -> Result<i64> {
        Ok(varint::zigzag_decode64(self.read_varint64()?))
    }

    /// Read a little-endian fixed 32-bit value.
    pub fn read_fixed32(&mut self) -> Result<u32> {
        if self.bytes_until_limit() < 4 {
            return Err(DecodeError::Truncated);
        }
        let value = LittleEndian::read_u32(self.remaining());
        self.advance(4)?;
        Ok(value)
    }

    /// Read a little-endian fixed 64-bit value.
    pub fn read_fixed64(&mut self) -> Result<u64> {
        if self.bytes_until_limit() < 8 {
            return Err(DecodeError::Truncated);
        }
        let value = LittleEndian::read_u64(self.remaining());
        self.advance(8)?;
        Ok(value)
    }

    /// Read a varint-encoded bool.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_varint64()? != 0)
    }

    /// Read a 32-bit float (fixed32 bit pattern).
    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_fixed32()?))
    }

    /// Read a 64-bit float (fixed64 bit pattern).
    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    /// Read a length-delimited payload into a [`ByteSeq`].
    pub fn read_bytes(&mut self) -> Result<ByteSeq> {
        let len = self.read_varint32()? as usize;
        if self.bytes_until_limit() < len {
            return Err(DecodeError::Truncated);
        }
        let seq = ByteSeq::copy_from_slice(&self.remaining()[..len]);
        self.advance(len)?;
        Ok(seq)
    }

    /// Read a length-delimited string.
    ///
    /// Invalid UTF-8 does not fail the read: malformed sequences are
    /// replaced with U+FFFD. Strict validity checking belongs to
    /// `ByteSeq::is_valid_utf8`, not to string decoding.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_varint32()? as usize;
        if self.bytes_until_limit() < len {
            return Err(DecodeError::Truncated);
        }
        let text = String::from_utf8_lossy(&self.remaining()[..len]).into_owned();
        self.advance(len)?;
        Ok(text)
    }

    /// Read a whole varint-length-prefixed message payload, or `None` at
    /// a clean end of input. This is the framing used to concatenate many
    /// independent messages in one stream.
    pub fn read_delimited(&mut self) -> Result<Option<ByteSeq>> {
        if self.is_at_end() {
            return Ok(None);
        }
        self.read_bytes().map(Some)
    }

    /// Discard `n` raw bytes.
    pub fn skip_raw(&mut self, n: usize) -> Result<()> {
        self.advance(n)
    }

    /// Consume and discard the field the given tag introduces, without
    /// materializing its payload.
    ///
    /// Returns `false` for an end-group tag (the caller is positioned at
    /// the end of a group it is reading), `true` otherwise.
    pub fn skip_field(&mut self, tag: Tag) -> Result<bool> {
        match tag.wire_type() {
            WireType::Varint => {
                self.read_varint64()?;
                Ok(true)
            }
            WireType::Fixed64 => {
                self.skip_raw(8)?;
                Ok(true)
            }
            WireType::LengthDelimited => {
                let len = self.read_varint32()? as usize;
                self.skip_raw(len)?;
                Ok(true)
            }
            WireType::StartGroup => {
                self.skip_group(tag.field_number())?;
                Ok(true)
            }
            WireType::EndGroup => Ok(false),
            WireType::Fixed32 => {
                self.skip_raw(4)?;
                Ok(true)
            }
        }
    }

    /// Skip a whole group, including nested groups, up to and including
    /// the matching end tag.
    fn skip_group(&mut self, field_number: u32) -> Result<()> {
        self.enter_nested()?;
        loop {
            let tag = self.read_tag()?.ok_or(DecodeError::Truncated)?;
            if tag.wire_type() == WireType::EndGroup {
                if tag.field_number() != field_number {
                    return Err(DecodeError::InvalidEndTag);
                }
                break;
            }
            self.skip_field(tag)?;
        }
        self.leave_nested();
        Ok(())
    }

    /// Skip every remaining field of the current scope. Stops after
    /// consuming an end-group tag, leaving group handling to the caller.
    pub fn skip_message(&mut self) -> Result<()> {
        while let Some(tag) = self.read_tag()? {
            if !self.skip_field(tag)? {
                return Ok(());
            }
        }
        Ok(())
    }
}
