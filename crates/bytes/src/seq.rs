//! The immutable byte sequence type.
//!
//! A [`ByteSeq`] is a handle to a shared, immutable sequence of bytes.
//! Cloning is O(1) (a reference-count bump), and every operation builds
//! new nodes instead of mutating existing ones, so sequences and their
//! sub-views can be shared freely across threads once constructed.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::rope;
use crate::utf8::{self, Utf8State};

/// Substrings at or below this length are copied out instead of holding a
/// view, so a tiny slice cannot keep a large parent buffer alive.
const SUBSTRING_COPY_LIMIT: usize = 32;

/// Chunk sizes for [`ByteSeq::read_from`]: start small, double per chunk.
const MIN_READ_CHUNK: usize = 256;
const MAX_READ_CHUNK: usize = 8192;

/// UTF-8 validity cache states.
const UTF8_UNKNOWN: u8 = 0;
const UTF8_VALID: u8 = 1;
const UTF8_INVALID: u8 = 2;

static EMPTY: Lazy<ByteSeq> = Lazy::new(|| ByteSeq::from_node(Repr::Flat(FlatRepr {
    data: Arc::from(&[][..]),
    offset: 0,
    len: 0,
})));

/// An immutable sequence of bytes of known length.
///
/// Equality and hashing are structural (byte-for-byte) and independent of
/// the internal tree shape. The hash is computed lazily on first use and
/// cached; the UTF-8 validity of the whole sequence is cached the same way.
#[derive(Clone)]
pub struct ByteSeq {
    node: Arc<Node>,
}

struct Node {
    /// Cached structural hash. 0 means "not yet computed"; a true hash of
    /// 0 is stored as 1 so the sentinel stays unambiguous.
    hash: AtomicU32,
    /// Cached whole-sequence UTF-8 validity trit.
    utf8: AtomicU8,
    repr: Repr,
}

pub(crate) struct FlatRepr {
    pub(crate) data: Arc<[u8]>,
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

pub(crate) struct ExternRepr {
    pub(crate) data: Arc<dyn AsRef<[u8]> + Send + Sync>,
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

pub(crate) struct RopeRepr {
    pub(crate) left: ByteSeq,
    pub(crate) right: ByteSeq,
    pub(crate) len: usize,
    pub(crate) depth: usize,
}

/// Closed set of representations. Every operation matches exhaustively.
pub(crate) enum Repr {
    Flat(FlatRepr),
    Extern(ExternRepr),
    Rope(RopeRepr),
}

impl ByteSeq {
    fn from_node(repr: Repr) -> ByteSeq {
        ByteSeq {
            node: Arc::new(Node {
                hash: AtomicU32::new(0),
                utf8: AtomicU8::new(UTF8_UNKNOWN),
                repr,
            }),
        }
    }

    /// The empty sequence.
    pub fn empty() -> ByteSeq {
        EMPTY.clone()
    }

    /// Create a sequence by copying the given bytes.
    pub fn copy_from_slice(bytes: &[u8]) -> ByteSeq {
        if bytes.is_empty() {
            return ByteSeq::empty();
        }
        let len = bytes.len();
        ByteSeq::from_node(Repr::Flat(FlatRepr {
            data: Arc::from(bytes),
            offset: 0,
            len,
        }))
    }

    /// Create a sequence that takes ownership of the given vector without
    /// copying it.
    pub fn from_vec(bytes: Vec<u8>) -> ByteSeq {
        if bytes.is_empty() {
            return ByteSeq::empty();
        }
        let len = bytes.len();
        ByteSeq::from_node(Repr::Flat(FlatRepr {
            data: Arc::from(bytes),
            offset: 0,
            len,
        }))
    }

    /// Create a sequence viewing a static byte slice without copying.
    pub fn from_static(bytes: &'static [u8]) -> ByteSeq {
        if bytes.is_empty() {
            return ByteSeq::empty();
        }
        let len = bytes.len();
        ByteSeq::from_node(Repr::Extern(ExternRepr {
            data: Arc::new(bytes),
            offset: 0,
            len,
        }))
    }

    /// Wrap externally owned memory without copying.
    ///
    /// The owner's `as_ref()` must return the same, unmodified bytes for
    /// the lifetime of every sequence derived from this one. That contract
    /// is documented rather than runtime-checked: mutating the wrapped
    /// memory after wrapping produces unspecified (but memory-safe)
    /// results for equality, hashing, and reads.
    pub fn wrap_owner(owner: Arc<dyn AsRef<[u8]> + Send + Sync>) -> ByteSeq {
        let len = owner.as_ref().as_ref().len();
        if len == 0 {
            return ByteSeq::empty();
        }
        ByteSeq::from_node(Repr::Extern(ExternRepr {
            data: owner,
            offset: 0,
            len,
        }))
    }

    /// Read an entire stream into a sequence.
    ///
    /// Bytes are pulled in chunks that start at 256 bytes and double up to
    /// 8 KiB, and the chunks are concatenated into a balanced tree, so a
    /// large stream never requires one allocation of its full size up
    /// front.
    pub fn read_from<R: io::Read>(source: &mut R) -> io::Result<ByteSeq> {
        let mut result = ByteSeq::empty();
        let mut chunk_size = MIN_READ_CHUNK;
        loop {
            let mut chunk = vec![0u8; chunk_size];
            let mut filled = 0;
            while filled < chunk.len() {
                let n = source.read(&mut chunk[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                return Ok(result);
            }
            chunk.truncate(filled);
            result = result.concat(&ByteSeq::from_vec(chunk));
            chunk_size = (chunk_size * 2).min(MAX_READ_CHUNK);
        }
    }

    pub(crate) fn rope_node(left: ByteSeq, right: ByteSeq) -> ByteSeq {
        debug_assert!(!left.is_empty() && !right.is_empty());
        let len = left.len() + right.len();
        let depth = left.depth().max(right.depth()) + 1;
        ByteSeq::from_node(Repr::Rope(RopeRepr {
            left,
            right,
            len,
            depth,
        }))
    }

    pub(crate) fn repr(&self) -> &Repr {
        &self.node.repr
    }

    /// Number of bytes in the sequence.
    pub fn len(&self) -> usize {
        match &self.node.repr {
            Repr::Flat(f) => f.len,
            Repr::Extern(e) => e.len,
            Repr::Rope(r) => r.len,
        }
    }

    /// Whether the sequence contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tree depth: 0 for contiguous sequences, max child depth + 1 for
    /// concatenation nodes.
    pub(crate) fn depth(&self) -> usize {
        match &self.node.repr {
            Repr::Flat(_) | Repr::Extern(_) => 0,
            Repr::Rope(r) => r.depth,
        }
    }

    /// The byte at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn byte_at(&self, index: usize) -> u8 {
        assert!(
            index < self.len(),
            "byte index {index} out of range for sequence of length {}",
            self.len()
        );
        let mut seq = self;
        let mut index = index;
        loop {
            match &seq.node.repr {
                Repr::Flat(f) => return f.data[f.offset + index],
                Repr::Extern(e) => return e.data.as_ref().as_ref()[e.offset + index],
                Repr::Rope(r) => {
                    let left_len = r.left.len();
                    if index < left_len {
                        seq = &r.left;
                    } else {
                        index -= left_len;
                        seq = &r.right;
                    }
                }
            }
        }
    }

    /// Concatenate `self` and `other` into a new sequence.
    ///
    /// Neither operand is copied unless the combined length is small; the
    /// result shares the operands' storage. The resulting tree is kept
    /// balanced so that repeated concatenation of small pieces stays
    /// O(log n) for later operations.
    pub fn concat(&self, other: &ByteSeq) -> ByteSeq {
        rope::concatenate(self.clone(), other.clone())
    }

    /// The sub-sequence covering `range`.
    ///
    /// For contiguous sequences this is a zero-copy view (an adjusted
    /// offset and length over the same storage), except that results of 32
    /// bytes or fewer are copied so a tiny slice does not pin a large
    /// parent buffer. For concatenation nodes the call recurses into the
    /// children the range intersects.
    ///
    /// # Panics
    ///
    /// Panics if `range.start > range.end` or `range.end > self.len()`.
    pub fn substring(&self, range: Range<usize>) -> ByteSeq {
        let Range { start, end } = range;
        assert!(
            start <= end && end <= self.len(),
            "substring {start}..{end} out of range for sequence of length {}",
            self.len()
        );
        if start == end {
            return ByteSeq::empty();
        }
        if start == 0 && end == self.len() {
            return self.clone();
        }
        let sub_len = end - start;
        match &self.node.repr {
            Repr::Flat(f) => {
                if sub_len <= SUBSTRING_COPY_LIMIT {
                    ByteSeq::copy_from_slice(&f.data[f.offset + start..f.offset + end])
                } else {
                    ByteSeq::from_node(Repr::Flat(FlatRepr {
                        data: Arc::clone(&f.data),
                        offset: f.offset + start,
                        len: sub_len,
                    }))
                }
            }
            Repr::Extern(e) => {
                if sub_len <= SUBSTRING_COPY_LIMIT {
                    let bytes = e.data.as_ref().as_ref();
                    ByteSeq::copy_from_slice(&bytes[e.offset + start..e.offset + end])
                } else {
                    ByteSeq::from_node(Repr::Extern(ExternRepr {
                        data: Arc::clone(&e.data),
                        offset: e.offset + start,
                        len: sub_len,
                    }))
                }
            }
            Repr::Rope(r) => {
                let left_len = r.left.len();
                if end <= left_len {
                    r.left.substring(start..end)
                } else if start >= left_len {
                    r.right.substring(start - left_len..end - left_len)
                } else {
                    let left_part = r.left.substring(start..left_len);
                    let right_part = r.right.substring(0..end - left_len);
                    left_part.concat(&right_part)
                }
            }
        }
    }

    /// Copy the sequence out into a freshly allocated vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for leaf in self.leaves() {
            out.extend_from_slice(leaf);
        }
        out
    }

    /// A borrowed view of the whole sequence, if it is contiguous.
    ///
    /// Returns `None` for concatenation nodes; callers that need
    /// contiguous access to a rope should use [`ByteSeq::to_vec`] or
    /// iterate [`ByteSeq::leaves`].
    pub fn as_contiguous(&self) -> Option<&[u8]> {
        self.node.leaf_slice()
    }

    /// Iterate the contiguous chunks of the sequence in order.
    ///
    /// Flat sequences yield one chunk; ropes yield their leaves
    /// left-to-right. Empty chunks are never yielded.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: if self.is_empty() { Vec::new() } else { vec![self] },
        }
    }

    pub(crate) fn collect_leaves(&self, out: &mut Vec<ByteSeq>) {
        match &self.node.repr {
            Repr::Flat(_) | Repr::Extern(_) => {
                if !self.is_empty() {
                    out.push(self.clone());
                }
            }
            Repr::Rope(r) => {
                r.left.collect_leaves(out);
                r.right.collect_leaves(out);
            }
        }
    }

    /// A sequential reader over the logical byte sequence.
    ///
    /// The reader iterates rope leaves in order without flattening the
    /// tree, and supports `mark`/`reset`/`skip` on top of
    /// [`std::io::Read`].
    pub fn reader(&self) -> crate::read::SeqReader {
        crate::read::SeqReader::new(self)
    }

    /// Whether the whole sequence is well-formed UTF-8.
    ///
    /// This is the strict check: overlong encodings, surrogate code
    /// points, and truncated multi-byte sequences all fail. The result is
    /// computed once and cached. The verdict is identical for every
    /// representation of the same bytes.
    pub fn is_valid_utf8(&self) -> bool {
        match self.node.utf8.load(Ordering::Relaxed) {
            UTF8_VALID => return true,
            UTF8_INVALID => return false,
            _ => {}
        }
        let mut state = Utf8State::COMPLETE;
        for leaf in self.leaves() {
            state = utf8::partial_validate(state, leaf);
            if state.is_malformed() {
                break;
            }
        }
        let valid = state.is_complete();
        self.node.utf8.store(
            if valid { UTF8_VALID } else { UTF8_INVALID },
            Ordering::Relaxed,
        );
        valid
    }

    /// The structural hash of the sequence.
    ///
    /// A 31-polynomial accumulation over all bytes, seeded with the
    /// length. Computed lazily and cached; two sequences with equal bytes
    /// produce equal hashes regardless of tree shape, because the value is
    /// accumulated leaf by leaf exactly as it would be over the flattened
    /// bytes.
    pub fn hash_value(&self) -> u32 {
        if let Some(h) = self.peek_cached_hash() {
            return h;
        }
        let mut h = self.len() as i32;
        for leaf in self.leaves() {
            h = partial_hash(h, leaf);
        }
        if h == 0 {
            h = 1;
        }
        let h = h as u32;
        self.node.hash.store(h, Ordering::Relaxed);
        h
    }

    fn peek_cached_hash(&self) -> Option<u32> {
        match self.node.hash.load(Ordering::Relaxed) {
            0 => None,
            h => Some(h),
        }
    }

    fn content_eq(&self, other: &ByteSeq) -> bool {
        debug_assert_eq!(self.len(), other.len());
        let mut ia = self.leaves();
        let mut ib = other.leaves();
        let mut a: &[u8] = &[];
        let mut b: &[u8] = &[];
        loop {
            if a.is_empty() {
                a = match ia.next() {
                    Some(chunk) => chunk,
                    None => return true,
                };
            }
            if b.is_empty() {
                b = match ib.next() {
                    Some(chunk) => chunk,
                    None => return true,
                };
            }
            let n = a.len().min(b.len());
            if a[..n] != b[..n] {
                return false;
            }
            a = &a[n..];
            b = &b[n..];
        }
    }
}

impl Node {
    fn leaf_slice(&self) -> Option<&[u8]> {
        match &self.repr {
            Repr::Flat(f) => Some(&f.data[f.offset..f.offset + f.len]),
            Repr::Extern(e) => Some(&e.data.as_ref().as_ref()[e.offset..e.offset + e.len]),
            Repr::Rope(_) => None,
        }
    }
}

/// Continue a polynomial hash over one more chunk of bytes.
///
/// Folding chunks through this function in order yields the same value as
/// one pass over the concatenated bytes, which is what lets rope hashing
/// agree with flat hashing.
pub(crate) fn partial_hash(h: i32, bytes: &[u8]) -> i32 {
    let mut h = h;
    for &b in bytes {
        h = h.wrapping_mul(31).wrapping_add(b as i8 as i32);
    }
    h
}

/// In-order iterator over a sequence's contiguous chunks.
pub struct Leaves<'a> {
    stack: Vec<&'a ByteSeq>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        while let Some(seq) = self.stack.pop() {
            match &seq.node.repr {
                Repr::Rope(r) => {
                    self.stack.push(&r.right);
                    self.stack.push(&r.left);
                }
                _ => {
                    let slice = seq.node.leaf_slice().unwrap_or(&[]);
                    if !slice.is_empty() {
                        return Some(slice);
                    }
                }
            }
        }
        None
    }
}

impl PartialEq for ByteSeq {
    fn eq(&self, other: &ByteSeq) -> bool {
        if Arc::ptr_eq(&self.node, &other.node) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        if let (Some(h1), Some(h2)) = (self.peek_cached_hash(), other.peek_cached_hash()) {
            if h1 != h2 {
                return false;
            }
        }
        self.content_eq(other)
    }
}

impl Eq for ByteSeq {}

impl Hash for ByteSeq {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash_value());
    }
}

impl Default for ByteSeq {
    fn default() -> ByteSeq {
        ByteSeq::empty()
    }
}

impl From<Vec<u8>> for ByteSeq {
    fn from(bytes: Vec<u8>) -> ByteSeq {
        ByteSeq::from_vec(bytes)
    }
}

impl From<&[u8]> for ByteSeq {
    fn from(bytes: &[u8]) -> ByteSeq {
        ByteSeq::copy_from_slice(bytes)
    }
}

impl fmt::Debug for ByteSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 48;
        write!(f, "ByteSeq(len={}, \"", self.len())?;
        let mut shown = 0;
        'outer: for leaf in self.leaves() {
            for &b in leaf {
                if shown == PREVIEW {
                    write!(f, "...")?;
                    break 'outer;
                }
                write!(f, "{b:02x}")?;
                shown += 1;
            }
        }
        write!(f, "\")")
    }
}
