//! Encoding output: growable buffer and streaming sinks.

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use filament_bytes::ByteSeq;

use crate::tag::{Tag, WireType};
use crate::varint;

/// Internal buffer size for [`StreamWriter`]; the buffer drains to the
/// sink whenever it fills past this.
const STREAM_BUFFER_SIZE: usize = 4096;

/// An encoder accumulating output in a growable in-memory buffer.
///
/// Every write appends exactly the number of bytes the matching function
/// in [`crate::sizing`] reports, so callers can compute a nested payload's
/// size before writing the parent's length prefix.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Create an empty writer.
    pub fn new() -> WireWriter {
        WireWriter { buf: Vec::new() }
    }

    /// Create an empty writer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> WireWriter {
        WireWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Consume the writer into an immutable byte sequence without copying.
    pub fn into_byte_seq(self) -> ByteSeq {
        ByteSeq::from_vec(self.buf)
    }

    /// Write a field tag.
    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) {
        varint::encode_varint32(Tag::new(field_number, wire_type).raw(), &mut self.buf);
    }

    /// Write a 64-bit varint.
    pub fn write_varint64(&mut self, value: u64) {
        varint::encode_varint64(value, &mut self.buf);
    }

    /// Write a 32-bit varint (widened without sign extension).
    pub fn write_varint32(&mut self, value: u32) {
        varint::encode_varint32(value, &mut self.buf);
    }

    /// Write a zigzag-encoded signed 32-bit value.
    pub fn write_sint32(&mut self, value: i32) {
        self.write_varint32(varint::zigzag_encode32(value));
    }

    /// Write a zigzag-encoded signed 64-bit value.
    pub fn write_sint64(&mut self, value: i64) {
        self.write_varint64(varint::zigzag_encode64(value));
    }

    /// Write a little-endian fixed 32-bit value.
    pub fn write_fixed32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian fixed 64-bit value.
    pub fn write_fixed64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a bool as a single-byte varint.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Write a 32-bit float as its fixed32 bit pattern.
    pub fn write_float(&mut self, value: f32) {
        self.write_fixed32(value.to_bits());
    }

    /// Write a 64-bit float as its fixed64 bit pattern.
    pub fn write_double(&mut self, value: f64) {
        self.write_fixed64(value.to_bits());
    }

    /// Append raw bytes with no framing.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a varint length prefix followed by the payload.
    pub fn write_len_prefixed(&mut self, payload: &[u8]) {
        self.write_varint64(payload.len() as u64);
        self.write_raw(payload);
    }

    /// Write a whole message payload in delimited framing (its own varint
    /// length prefix), for concatenating messages in one stream.
    pub fn write_delimited(&mut self, payload: &[u8]) {
        self.write_len_prefixed(payload);
    }

    /// Append a byte sequence, iterating rope leaves without flattening.
    pub fn write_seq(&mut self, seq: &ByteSeq) {
        for leaf in seq.leaves() {
            self.buf.extend_from_slice(leaf);
        }
    }

    /// Write a length prefix followed by a byte sequence.
    pub fn write_len_prefixed_seq(&mut self, seq: &ByteSeq) {
        self.write_varint64(seq.len() as u64);
        self.write_seq(seq);
    }
}

/// An encoder forwarding output to an [`io::Write`] sink through an
/// internal buffer.
///
/// Writes may be buffered until [`StreamWriter::flush`] runs; flush
/// guarantees every buffered byte reaches the sink before returning.
pub struct StreamWriter<W: Write> {
    sink: W,
    buf: Vec<u8>,
}

impl<W: Write> StreamWriter<W> {
    /// Create a writer over `sink`.
    pub fn new(sink: W) -> StreamWriter<W> {
        StreamWriter {
            sink,
            buf: Vec::with_capacity(STREAM_BUFFER_SIZE),
        }
    }

    fn drain_if_full(&mut self) -> io::Result<()> {
        if self.buf.len() >= STREAM_BUFFER_SIZE {
            self.drain()?;
        }
        Ok(())
    }

    fn drain(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.sink.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Flush buffered bytes through to the sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.drain()?;
        self.sink.flush()
    }

    /// Flush and return the sink.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.sink)
    }

    /// Write a field tag.
    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) -> io::Result<()> {
        varint::encode_varint32(Tag::new(field_number, wire_type).raw(), &mut self.buf);
        self.drain_if_full()
    }

    /// Write a 64-bit varint.
    pub fn write_varint64(&mut self, value: u64) -> io::Result<()> {
        varint::encode_varint64(value, &mut self.buf);
        self.drain_if_full()
    }

    /// Write a 32-bit varint.
    pub fn write_varint32(&mut self, value: u32) -> io::Result<()> {
        varint::encode_varint32(value, &mut self.buf);
        self.drain_if_full()
    }

    /// Write a zigzag-encoded signed 32-bit value.
    pub fn write_sint32(&mut self, value: i32) -> io::Result<()> {
        self.write_varint32(varint::zigzag_encode32(value))
    }

    /// Write a zigzag-encoded signed 64-bit value.
    pub fn write_sint64(&mut self, value: i64) -> io::Result<()> {
        self.write_varint64(varint::zigzag_encode64(value))
    }

    /// Write a little-endian fixed 32-bit value.
    pub fn write_fixed32(&mut self, value: u32) -> io::Result<()> {
        self.buf.write_u32::<LittleEndian>(value)?;
        self.drain_if_full()
    }

    /// Write a little-endian fixed 64-bit value.
    pub fn write_fixed64(&mut self, value: u64) -> io::Result<()> {
        self.buf.write_u64::<LittleEndian>(value)?;
        self.drain_if_full()
    }

    /// Write a bool as a single-byte varint.
    pub fn write_bool(&mut self, value: bool) -> io::Result<()> {
        self.buf.push(value as u8);
        self.drain_if_full()
    }

    /// Append raw bytes with no framing.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.len() >= STREAM_BUFFER_SIZE {
            // Large payloads bypass the buffer.
            self.drain()?;
            self.sink.write_all(bytes)?;
            return Ok(());
        }
        self.buf.extend_from_slice(bytes);
        self.drain_if_full()
    }

    /// Write a varint length prefix followed by the payload.
    pub fn write_len_prefixed(&mut self, payload: &[u8]) -> io::Result<()> {
        self.write_varint64(payload.len() as u64)?;
        self.write_raw(payload)
    }

    /// Write a whole message payload in delimited framing.
    pub fn write_delimited(&mut self, payload: &[u8]) -> io::Result<()> {
        self.write_len_prefixed(payload)
    }

    /// Hand a byte sequence's storage to the sink without copying it into
    /// the internal buffer.
    ///
    /// The buffered bytes are drained first so ordering is preserved, then
    /// each rope leaf is passed to the sink directly. The sink must treat
    /// the slices as immutable and must not retain them past the call;
    /// sinks that cannot honor that should copy, which `write_all` on
    /// ordinary sinks already does.
    pub fn write_seq(&mut self, seq: &ByteSeq) -> io::Result<()> {
        self.drain()?;
        for leaf in seq.leaves() {
            self.sink.write_all(leaf)?;
        }
        Ok(())
    }

    /// Write a length prefix followed by a byte sequence.
    pub fn write_len_prefixed_seq(&mut self, seq: &ByteSeq) -> io::Result<()> {
        self.write_varint64(seq.len() as u64)?;
        self.write_seq(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing;

    // === Size agreement: every write advances its sizing result ===

    #[test]
    fn test_varint_writes_agree_with_sizing() {
        for value in [0u64, 1, 127, 128, 300, 1 << 21, u64::MAX] {
            let mut w = WireWriter::new();
            w.write_varint64(value);
            assert_eq!(w.len(), sizing::varint64(value), "value {value}");
        }
    }

    #[test]
    fn test_sint_writes_agree_with_sizing() {
        for value in [0i64, -1, 1, i64::MIN, i64::MAX, -123456] {
            let mut w = WireWriter::new();
            w.write_sint64(value);
            assert_eq!(w.len(), sizing::sint64(value), "value {value}");
        }
        for value in [0i32, -1, i32::MIN, i32::MAX] {
            let mut w = WireWriter::new();
            w.write_sint32(value);
            assert_eq!(w.len(), sizing::sint32(value), "value {value}");
        }
    }

    #[test]
    fn test_fixed_and_tag_writes_agree_with_sizing() {
        let mut w = WireWriter::new();
        w.write_tag(2048, WireType::Fixed64);
        w.write_fixed64(1);
        assert_eq!(w.len(), sizing::fixed64_field(2048));

        let mut w = WireWriter::new();
        w.write_tag(1, WireType::LengthDelimited);
        w.write_len_prefixed(b"hello");
        assert_eq!(w.len(), sizing::bytes_field(1, 5));
    }

    #[test]
    fn test_fixed_values_little_endian() {
        let mut w = WireWriter::new();
        w.write_fixed32(0x01020304);
        assert_eq!(w.as_slice(), &[0x04, 0x03, 0x02, 0x01]);

        let mut w = WireWriter::new();
        w.write_fixed64(0x0102030405060708);
        assert_eq!(
            w.as_slice(),
            &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_write_seq_iterates_rope() {
        let rope = ByteSeq::from_vec(vec![1u8; 200])
            .concat(&ByteSeq::from_vec(vec![2u8; 200]));
        let mut w = WireWriter::new();
        w.write_seq(&rope);
        assert_eq!(w.len(), 400);
        assert_eq!(w.as_slice()[..200], [1u8; 200]);
        assert_eq!(w.as_slice()[200..], [2u8; 200]);
    }

    // === StreamWriter ===

    #[test]
    fn test_stream_writer_matches_vec_writer() {
        let mut vec_writer = WireWriter::new();
        vec_writer.write_tag(1, WireType::Varint);
        vec_writer.write_varint64(300);
        vec_writer.write_tag(2, WireType::Fixed32);
        vec_writer.write_fixed32(7);
        vec_writer.write_tag(3, WireType::LengthDelimited);
        vec_writer.write_len_prefixed(b"abc");

        let mut sink = Vec::new();
        {
            let mut sw = StreamWriter::new(&mut sink);
            sw.write_tag(1, WireType::Varint).unwrap();
            sw.write_varint64(300).unwrap();
            sw.write_tag(2, WireType::Fixed32).unwrap();
            sw.write_fixed32(7).unwrap();
            sw.write_tag(3, WireType::LengthDelimited).unwrap();
            sw.write_len_prefixed(b"abc").unwrap();
            sw.flush().unwrap();
        }
        assert_eq!(sink, vec_writer.into_bytes());
    }

    #[test]
    fn test_stream_writer_flush_drains_everything() {
        let mut sink = Vec::new();
        let mut sw = StreamWriter::new(&mut sink);
        sw.write_varint64(1).unwrap();
        sw.flush().unwrap();
        drop(sw);
        assert_eq!(sink, vec![1]);
    }

    #[test]
    fn test_stream_writer_zero_copy_seq_ordering() {
        // Buffered bytes must reach the sink before the directly handed
        // sequence, whatever the interleaving.
        let seq = ByteSeq::from_vec(vec![9u8; 5000]);
        let mut sink = Vec::new();
        {
            let mut sw = StreamWriter::new(&mut sink);
            sw.write_varint64(0x7F).unwrap();
            sw.write_seq(&seq).unwrap();
            sw.write_varint64(0x7E).unwrap();
            sw.flush().unwrap();
        }
        assert_eq!(sink[0], 0x7F);
        assert_eq!(&sink[1..5001], &[9u8; 5000][..]);
        assert_eq!(sink[5001], 0x7E);
    }

    #[test]
    fn test_stream_writer_large_payload_bypasses_buffer() {
        let payload = vec![3u8; STREAM_BUFFER_SIZE * 3];
        let mut sink = Vec::new();
        {
            let mut sw = StreamWriter::new(&mut sink);
            sw.write_raw(&payload).unwrap();
            sw.flush().unwrap();
        }
        assert_eq!(sink, payload);
    }

    #[test]
    fn test_stream_writer_to_file() {
        use std::io::{Read, Seek, SeekFrom};

        let mut file = tempfile::tempfile().unwrap();
        {
            let mut sw = StreamWriter::new(&mut file);
            sw.write_tag(1, WireType::LengthDelimited).unwrap();
            sw.write_len_prefixed(b"persisted").unwrap();
            sw.flush().unwrap();
        }
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();

        let mut expected = WireWriter::new();
        expected.write_tag(1, WireType::LengthDelimited);
        expected.write_len_prefixed(b"persisted");
        assert_eq!(contents, expected.into_bytes());
    }

    #[test]
    fn test_into_byte_seq() {
        let mut w = WireWriter::new();
        w.write_raw(b"wrapped");
        let seq = w.into_byte_seq();
        assert_eq!(seq.to_vec(), b"wrapped");
    }
}
