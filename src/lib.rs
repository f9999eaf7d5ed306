//! Filament - length-prefixed binary wire-format serialization core
//!
//! Filament encodes structured, schema-described messages into compact
//! byte streams and decodes them back, with explicit support for
//! forward/backward-compatible evolution: fields a schema does not
//! recognize survive parse -> mutate -> reserialize round trips
//! losslessly, and typed extensions attach to numbered slots outside a
//! base message.
//!
//! # Quick Start
//!
//! ```ignore
//! use filament::{UnknownFieldStore, WireReader, WireWriter, WireType};
//!
//! // Encode two fields.
//! let mut writer = WireWriter::new();
//! writer.write_tag(1, WireType::Varint);
//! writer.write_varint64(150);
//! writer.write_tag(2, WireType::LengthDelimited);
//! writer.write_len_prefixed(b"payload");
//! let bytes = writer.into_bytes();
//!
//! // Capture them as unknown fields and reserialize byte-exactly.
//! let mut reader = WireReader::new(&bytes);
//! let store = UnknownFieldStore::parse_from(&mut reader)?;
//! assert_eq!(store.to_bytes(), bytes);
//! ```
//!
//! # Architecture
//!
//! The implementation is split across three member crates, re-exported
//! here: `filament-bytes` (the immutable rope-shaped byte container and
//! UTF-8 validation), `filament-wire` (varint/tag codec, readers,
//! writers, decode limits), and `filament-fields` (unknown-field store,
//! hybrid field table, extensions, lazy cells).

// Re-export the public API from the member crates.
pub use filament_bytes::utf8;
pub use filament_bytes::{ByteSeq, Leaves, SeqReader, Utf8State};
pub use filament_fields::{
    ExtensionError, ExtensionSet, ExtensionValue, FieldTable, FieldType, FrozenError, Lazy,
    UnknownField, UnknownFieldStore,
};
pub use filament_wire::{
    sizing, varint, DecodeError, DecodeLimits, PrevLimit, Result, StreamReader, StreamWriter,
    Tag, WireRead, WireReader, WireType, WireWriter, MAX_FIELD_NUMBER,
};
