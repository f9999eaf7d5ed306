//! Sequential reading of a byte sequence.
//!
//! [`SeqReader`] walks a sequence's leaves in order, so reading a rope
//! never flattens it. The reader owns clones of the leaves (cheap
//! reference-count bumps) and therefore keeps the underlying storage alive
//! for its own lifetime.

use std::io;

use crate::seq::ByteSeq;

/// A sequential, positioned reader over a [`ByteSeq`].
///
/// Implements [`std::io::Read`], plus `mark`/`reset`/`skip` for the
/// rewind-and-reread patterns message parsers use.
pub struct SeqReader {
    /// The sequence's leaves in order; each is contiguous and non-empty.
    leaves: Vec<ByteSeq>,
    /// Index of the leaf the cursor is in.
    leaf_index: usize,
    /// Offset of the cursor within the current leaf.
    leaf_offset: usize,
    /// Absolute position from the start of the logical sequence.
    position: usize,
    /// Total length of the logical sequence.
    total_len: usize,
    /// Position remembered by [`SeqReader::mark`].
    mark: usize,
}

impl SeqReader {
    pub(crate) fn new(seq: &ByteSeq) -> SeqReader {
        let mut leaves = Vec::new();
        seq.collect_leaves(&mut leaves);
        SeqReader {
            leaves,
            leaf_index: 0,
            leaf_offset: 0,
            position: 0,
            total_len: seq.len(),
            mark: 0,
        }
    }

    /// Absolute position from the start of the sequence.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes remaining until the end of the sequence.
    pub fn remaining(&self) -> usize {
        self.total_len - self.position
    }

    /// Remember the current position for a later [`SeqReader::reset`].
    pub fn mark(&mut self) {
        self.mark = self.position;
    }

    /// Rewind to the most recently marked position (the start, if `mark`
    /// was never called).
    pub fn reset(&mut self) {
        let target = self.mark;
        self.seek_to(target);
    }

    /// Advance past up to `n` bytes without copying them out; returns how
    /// many bytes were actually skipped (less than `n` only at the end of
    /// the sequence).
    pub fn skip(&mut self, n: usize) -> usize {
        let skipped = n.min(self.remaining());
        let target = self.position + skipped;
        self.seek_to(target);
        skipped
    }

    fn seek_to(&mut self, target: usize) {
        debug_assert!(target <= self.total_len);
        let mut index = 0;
        let mut consumed = 0;
        while index < self.leaves.len() {
            let leaf_len = self.leaves[index].len();
            if consumed + leaf_len > target {
                break;
            }
            consumed += leaf_len;
            index += 1;
        }
        self.leaf_index = index;
        self.leaf_offset = target - consumed;
        self.position = target;
    }
}

impl io::Read for SeqReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() && self.leaf_index < self.leaves.len() {
            let leaf = &self.leaves[self.leaf_index];
            let chunk = leaf
                .as_contiguous()
                .expect("collected leaves are contiguous");
            let available = &chunk[self.leaf_offset..];
            let n = available.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&available[..n]);
            written += n;
            self.leaf_offset += n;
            self.position += n;
            if self.leaf_offset == chunk.len() {
                self.leaf_index += 1;
                self.leaf_offset = 0;
            }
        }
        Ok(written)
    }
}
