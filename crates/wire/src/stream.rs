//! Decoding cursor over a streamed byte source.
//!
//! [`StreamReader`] wraps any [`std::io::Read`] behind an internal buffer.
//! When the buffer runs dry the reader refills it with a blocking read on
//! the calling thread — that blocking is expected behavior, not an error;
//! callers wanting non-blocking semantics wrap the source accordingly.

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};
use filament_bytes::ByteSeq;
use tracing::warn;

use crate::error::{DecodeError, Result};
use crate::limits::DecodeLimits;
use crate::reader::PrevLimit;
use crate::tag::{Tag, WireType};
use crate::varint;

/// Internal refill buffer size.
const BUFFER_SIZE: usize = 4096;

/// A decoding cursor over an [`std::io::Read`] source.
///
/// Exposes the same operations as [`crate::WireReader`] with the same
/// defensive limits; positions and limits are tracked as absolute byte
/// counts across buffer refills. The size ceiling additionally caps how
/// much is ever fetched from the source, so a hostile stream cannot force
/// unbounded buffering.
pub struct StreamReader<R: Read> {
    source: R,
    buf: Vec<u8>,
    /// Cursor within `buf[..buf_end]`.
    buf_pos: usize,
    /// Valid bytes in `buf`.
    buf_end: usize,
    /// Bytes retired from the buffer before its current contents.
    consumed_before: usize,
    /// Absolute position ceiling of the innermost limit scope;
    /// `usize::MAX` when no limit is pushed.
    current_limit: usize,
    recursion_depth: u32,
    limits: DecodeLimits,
    /// Absolute position at the last size-counter reset.
    size_base: usize,
}

impl<R: Read> StreamReader<R> {
    /// Create a reader over `source` with default limits.
    pub fn new(source: R) -> StreamReader<R> {
        StreamReader::with_limits(source, DecodeLimits::default())
    }

    /// Create a reader over `source` with explicit limits.
    pub fn with_limits(source: R, limits: DecodeLimits) -> StreamReader<R> {
        StreamReader {
            source,
            buf: vec![0u8; BUFFER_SIZE],
            buf_pos: 0,
            buf_end: 0,
            consumed_before: 0,
            current_limit: usize::MAX,
            recursion_depth: 0,
            limits,
            size_base: 0,
        }
    }

    /// Absolute position from the start of the stream.
    pub fn position(&self) -> usize {
        self.consumed_before + self.buf_pos
    }

    /// Restart the cumulative size counter, for callers that decode many
    /// independent messages from one connection.
    pub fn reset_size_counter(&mut self) {
        self.size_base = self.position();
    }

    /// Buffered bytes readable before the next refill or limit.
    fn available(&self) -> usize {
        let cap = self.current_limit.saturating_sub(self.consumed_before);
        self.buf_end.min(cap).saturating_sub(self.buf_pos)
    }

    /// Fetch more bytes from the source.
    ///
    /// With `required`, running out of input is a [`DecodeError::Truncated`]
    /// error; otherwise end of input reports `Ok(false)`.
    fn refill(&mut self, required: bool) -> Result<bool> {
        debug_assert_eq!(self.available(), 0);
        if self.position() >= self.current_limit {
            return if required {
                Err(DecodeError::Truncated)
            } else {
                Ok(false)
            };
        }

        self.consumed_before += self.buf_end;
        self.buf_pos = 0;
        self.buf_end = 0;

        let allowance = (self.size_base + self.limits.size_limit)
            .saturating_sub(self.position());
        if allowance == 0 {
            warn!(
                limit = self.limits.size_limit,
                position = self.position(),
                "stream decode size limit exceeded"
            );
            return Err(DecodeError::SizeLimitExceeded {
                limit: self.limits.size_limit,
            });
        }

        // Blocking read on the calling thread; never fetches more than the
        // size ceiling allows.
        let want = BUFFER_SIZE.min(allowance);
        let n = self.source.read(&mut self.buf[..want])?;
        if n == 0 {
            if required {
                Err(DecodeError::Truncated)
            } else {
                Ok(false)
            }
        } else {
            self.buf_end = n;
            Ok(true)
        }
    }

    /// Whether the cursor is at the end of the current scope — the
    /// innermost limit, or the end of the stream when no limit is pushed.
    /// May block to probe the source for more input.
    pub fn is_at_end(&mut self) -> Result<bool> {
        if self.available() > 0 {
            return Ok(false);
        }
        if self.position() == self.current_limit {
            return Ok(true);
        }
        Ok(!self.refill(false)?)
    }

    /// Establish a ceiling `len` bytes past the current position.
    ///
    /// The stream's total length is unknowable up front, so an oversized
    /// declared length surfaces as [`DecodeError::Truncated`] when the
    /// source is exhausted inside the limit — unless it already exceeds an
    /// enclosing limit, which fails here immediately.
    pub fn push_limit(&mut self, len: usize) -> Result<PrevLimit> {
        let new_limit = self
            .position()
            .checked_add(len)
            .ok_or(DecodeError::Truncated)?;
        if new_limit > self.current_limit {
            return Err(DecodeError::Truncated);
        }
        let prev = PrevLimit(self.current_limit);
        self.current_limit = new_limit;
        Ok(prev)
    }

    /// Restore the limit active before the matching
    /// [`StreamReader::push_limit`].
    pub fn pop_limit(&mut self, prev: PrevLimit) {
        self.current_limit = prev.0;
    }

    /// Bytes remaining before the innermost limit. Meaningless (and
    /// enormous) when no limit is pushed.
    pub fn bytes_until_limit(&self) -> usize {
        self.current_limit - self.position()
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

    fn read_raw_byte(&mut self) -> Result<u8> {
        if self.available() == 0 {
            self.refill(true)?;
        }
        let b = self.buf[self.buf_pos];
        self.buf_pos += 1;
        Ok(b)
    }

    fn read_exact_into(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.available() == 0 {
                self.refill(true)?;
            }
            let take = (out.len() - filled).min(self.available());
            out[filled..filled + take]
                .copy_from_slice(&self.buf[self.buf_pos..self.buf_pos + take]);
            self.buf_pos += take;
            filled += take;
        }
        Ok(())
    }

    /// Read `n` raw bytes.
    ///
    /// The output grows as bytes actually arrive; a hostile length claim
    /// never causes an allocation of the claimed size.
    fn read_raw_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n.min(BUFFER_SIZE));
        let mut remaining = n;
        while remaining > 0 {
            if self.available() == 0 {
                self.refill(true)?;
            }
            let take = remaining.min(self.available());
            out.extend_from_slice(&self.buf[self.buf_pos..self.buf_pos + take]);
            self.buf_pos += take;
            remaining -= take;
        }
        Ok(out)
    }

    /// Read the next field tag, or `None` at a clean end of the current
    /// scope.
    pub fn read_tag(&mut self) -> Result<Option<Tag>> {
        if self.is_at_end()? {
            return Ok(None);
        }
        let raw = self.read_varint32()?;
        Tag::from_raw(raw).map(Some)
    }

    /// Read a 64-bit varint.
    pub fn read_varint64(&mut self) -> Result<u64> {
        let mut result = 0u64;
        for i in 0..varint::MAX_VARINT_LEN {
            let b = self.read_raw_byte()?;
            result |= ((b & 0x7F) as u64) << (7 * i);
            if b & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(DecodeError::MalformedVarint)
    }

    /// Read a varint and keep its low 32 bits.
    pub fn read_varint32(&mut self) -> Result<u32> {
        Ok(self.read_varint64()? as u32)
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
        let mut bytes = [0u8; 4];
        self.read_exact_into(&mut bytes)?;
        Ok(LittleEndian::read_u32(&bytes))
    }

    /// Read a little-endian fixed 64-bit value.
    pub fn read_fixed64(&mut self) -> Result<u64> {
        let mut bytes = [0u8; 8];
        self.read_exact_into(&mut bytes)?;
        Ok(LittleEndian::read_u64(&bytes))
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
        if self
            .position()
            .checked_add(len)
            .map_or(true, |end| end > self.current_limit)
        {
            return Err(DecodeError::Truncated);
        }
        Ok(ByteSeq::from_vec(self.read_raw_bytes(len)?))
    }

    /// Read a length-delimited string, substituting U+FFFD for invalid
    /// UTF-8 rather than failing.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_varint32()? as usize;
        let bytes = self.read_raw_bytes(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a whole varint-length-prefixed message payload, or `None` at
    /// a clean end of the stream.
    pub fn read_delimited(&mut self) -> Result<Option<ByteSeq>> {
        if self.is_at_end()? {
            return Ok(None);
        }
        self.read_bytes().map(Some)
    }

    /// Discard `n` raw bytes without materializing them.
    pub fn skip_raw(&mut self, n: usize) -> Result<()> {
        let mut remaining = n;
        while remaining > 0 {
            if self.available() == 0 {
                self.refill(true)?;
            }
            let take = remaining.min(self.available());
            self.buf_pos += take;
            remaining -= take;
        }
        Ok(())
    }

    /// Consume and discard the field the given tag introduces. Returns
    /// `false` for an end-group tag.
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
    /// consuming an end-group tag.
    pub fn skip_message(&mut self) -> Result<()> {
        while let Some(tag) = self.read_tag()? {
            if !self.skip_field(tag)? {
                return Ok(());
            }
        }
        Ok(())
    }
}
