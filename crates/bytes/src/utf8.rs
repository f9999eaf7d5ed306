//! Resumable UTF-8 validation.
//!
//! The validator answers "is this byte sequence well-formed UTF-8" with
//! full structural strictness: overlong encodings, surrogate code points
//! (U+D800..=U+DFFF), and code points above U+10FFFF are all rejected, so
//! the verdict agrees exactly with `std::str::from_utf8`.
//!
//! Validation is resumable: [`partial_validate`] accepts a small state
//! value describing an in-progress multi-byte character and returns a new
//! one, so the same validator runs identically over one flat buffer or
//! over arbitrary chunkings of the same bytes (substring views, rope
//! leaves). The state is an explicit value the caller threads through
//! calls, never hidden mutable validator state.

/// Validation state between chunks.
///
/// One of three shapes:
/// - [`Utf8State::COMPLETE`]: everything seen so far is well-formed and no
///   character is in progress.
/// - [`Utf8State::MALFORMED`]: the input is definitely not well-formed;
///   absorbing further bytes cannot repair it.
/// - An incomplete state carrying the 1-3 bytes of a multi-byte character
///   whose remainder is expected at the start of the next chunk. Only
///   prefixes that can still be completed to a valid character are ever
///   stored; a constraint violation surfaces as `MALFORMED` immediately,
///   at whichever chunk boundary the offending byte arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf8State(u32);

impl Utf8State {
    /// All input so far is well-formed; no character is in progress.
    pub const COMPLETE: Utf8State = Utf8State(0);

    /// The input is definitely not well-formed UTF-8.
    pub const MALFORMED: Utf8State = Utf8State(u32::MAX);

    /// Whether this state is [`Utf8State::COMPLETE`].
    pub fn is_complete(self) -> bool {
        self == Utf8State::COMPLETE
    }

    /// Whether this state is [`Utf8State::MALFORMED`].
    pub fn is_malformed(self) -> bool {
        self == Utf8State::MALFORMED
    }

    /// Pack 1-3 pending bytes of an in-progress character.
    ///
    /// The lead byte occupies the low 8 bits, continuation bytes the next
    /// two groups. A lead byte is never 0 and continuation bytes are in
    /// 0x80..=0xBF, so 0 in a group unambiguously means "absent" and the
    /// packed value never collides with `COMPLETE`.
    fn pending(bytes: &[u8]) -> Utf8State {
        debug_assert!((1..=3).contains(&bytes.len()));
        let mut packed = 0u32;
        for (i, &b) in bytes.iter().enumerate() {
            packed |= (b as u32) << (8 * i);
        }
        Utf8State(packed)
    }

    /// Unpack pending bytes into `buf`, returning how many there are.
    fn unpack(self, buf: &mut [u8; 3]) -> usize {
        let mut count = 0;
        let mut packed = self.0;
        while packed != 0 && count < 3 {
            buf[count] = (packed & 0xFF) as u8;
            packed >>= 8;
            count += 1;
        }
        count
    }
}

/// Total length (including the lead byte) of the character a lead byte
/// introduces, or `None` if the byte can never begin a character.
fn sequence_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        // 0x80..=0xBF: continuation bytes in lead position.
        // 0xC0, 0xC1: overlong two-byte forms.
        // 0xF5..=0xFF: code points above U+10FFFF.
        _ => None,
    }
}

/// Whether `b` is acceptable as the second byte of a character introduced
/// by `lead`. The second byte carries all the structural constraints:
/// overlong three/four-byte forms, surrogates, and planes above 16 are all
/// excluded here. Third and fourth bytes are plain continuations.
fn second_byte_ok(lead: u8, b: u8) -> bool {
    let (lo, hi) = match lead {
        0xE0 => (0xA0, 0xBF), // excludes overlong three-byte forms
        0xED => (0x80, 0x9F), // excludes surrogates
        0xF0 => (0x90, 0xBF), // excludes overlong four-byte forms
        0xF4 => (0x80, 0x8F), // excludes code points above U+10FFFF
        _ => (0x80, 0xBF),
    };
    (lo..=hi).contains(&b)
}

fn is_continuation(b: u8) -> bool {
    (0x80..=0xBF).contains(&b)
}

/// Whether `bytes` is entirely well-formed UTF-8.
///
/// A trailing incomplete character makes the input invalid; use
/// [`partial_validate`] when more input may follow.
pub fn validate(bytes: &[u8]) -> bool {
    partial_validate(Utf8State::COMPLETE, bytes).is_complete()
}

/// Continue validation over one more chunk.
///
/// `state` is [`Utf8State::COMPLETE`] for the first chunk, or the value
/// returned for the previous chunk. The final verdict for a sequence of
/// chunks is identical to validating their concatenation in one call.
pub fn partial_validate(state: Utf8State, bytes: &[u8]) -> Utf8State {
    if state.is_malformed() {
        return Utf8State::MALFORMED;
    }

    let mut index = 0;

    if !state.is_complete() {
        // Finish the character straddling the previous chunk boundary.
        let mut pending = [0u8; 3];
        let mut have = state.unpack(&mut pending);
        let lead = pending[0];
        let total = match sequence_len(lead) {
            Some(total) if total >= 2 => total,
            _ => return Utf8State::MALFORMED,
        };
        while have < total {
            if index == bytes.len() {
                return Utf8State::pending(&pending[..have.min(3)]);
            }
            let b = bytes[index];
            let ok = if have == 1 {
                second_byte_ok(lead, b)
            } else {
                is_continuation(b)
            };
            if !ok {
                return Utf8State::MALFORMED;
            }
            if have < 3 {
                pending[have] = b;
            }
            have += 1;
            index += 1;
        }
    }

    scan(&bytes[index..])
}

/// Validate a chunk starting at a character boundary.
fn scan(bytes: &[u8]) -> Utf8State {
    let n = bytes.len();
    let mut i = 0;
    while i < n {
        let lead = bytes[i];
        if lead < 0x80 {
            i += 1;
            continue;
        }
        let total = match sequence_len(lead) {
            Some(total) => total,
            None => return Utf8State::MALFORMED,
        };
        if i + total > n {
            // Character runs past this chunk: check the bytes we do have,
            // then report the prefix as pending.
            let mut have = 1;
            while i + have < n {
                let b = bytes[i + have];
                let ok = if have == 1 {
                    second_byte_ok(lead, b)
                } else {
                    is_continuation(b)
                };
                if !ok {
                    return Utf8State::MALFORMED;
                }
                have += 1;
            }
            return Utf8State::pending(&bytes[i..n]);
        }
        if !second_byte_ok(lead, bytes[i + 1]) {
            return Utf8State::MALFORMED;
        }
        for k in 2..total {
            if !is_continuation(bytes[i + k]) {
                return Utf8State::MALFORMED;
            }
        }
        i += total;
    }
    Utf8State::COMPLETE
}
