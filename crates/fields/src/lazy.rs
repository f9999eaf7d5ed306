//! Deferred decoding of nested payloads.
//!
//! A nested message field often arrives as raw bytes that the caller may
//! never look at. [`Lazy`] holds the undecoded bytes and decodes on first
//! access, memoizing the result: repeated gets return the same reference
//! until the cell is explicitly reassigned. Decode configuration is
//! passed at the call site, never through ambient process state.

use filament_bytes::ByteSeq;
use once_cell::sync::OnceCell;

/// A cell holding either raw undecoded bytes, a memoized decoded value,
/// or both (the value plus the bytes it was derived from).
#[derive(Debug)]
pub struct Lazy<T> {
    /// The encoded form, absent after an explicit value assignment.
    raw: Option<ByteSeq>,
    cell: OnceCell<T>,
}

impl<T> Lazy<T> {
    /// Hold raw bytes for later decoding.
    pub fn new(bytes: ByteSeq) -> Lazy<T> {
        Lazy {
            raw: Some(bytes),
            cell: OnceCell::new(),
        }
    }

    /// Hold an already-decoded value.
    pub fn from_value(value: T) -> Lazy<T> {
        Lazy {
            raw: None,
            cell: OnceCell::from(value),
        }
    }

    /// The undecoded bytes, if this cell still represents its encoded
    /// form. `None` after [`Lazy::set_value`].
    pub fn bytes(&self) -> Option<&ByteSeq> {
        self.raw.as_ref()
    }

    /// Whether the value has been decoded (or directly assigned).
    pub fn is_decoded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The decoded value, decoding with `decode` on first access.
    ///
    /// Decoding runs at most once; every later call returns the same
    /// reference without invoking `decode` again. When the cell was built
    /// with [`Lazy::from_value`], `decode` is never called.
    pub fn get_or_decode<E, F>(&self, decode: F) -> Result<&T, E>
    where
        F: FnOnce(&ByteSeq) -> Result<T, E>,
    {
        self.cell.get_or_try_init(|| {
            let bytes = self
                .raw
                .as_ref()
                .expect("a lazy cell always holds bytes or a value");
            decode(bytes)
        })
    }

    /// Replace the cell with new raw bytes, discarding any memoized value.
    pub fn set_bytes(&mut self, bytes: ByteSeq) {
        self.raw = Some(bytes);
        self.cell = OnceCell::new();
    }

    /// Replace the cell with a decoded value, discarding the raw bytes it
    /// no longer corresponds to.
    pub fn set_value(&mut self, value: T) {
        self.raw = None;
        self.cell = OnceCell::from(value);
    }
}

impl<T: Clone> Clone for Lazy<T> {
    fn clone(&self) -> Lazy<T> {
        Lazy {
            raw: self.raw.clone(),
            cell: self.cell.clone(),
        }
    }
}
