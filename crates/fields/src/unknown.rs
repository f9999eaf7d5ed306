//! Lossless capture of unrecognized fields.
//!
//! A parser that meets a field number its schema does not know (or knows
//! with a different wire type) routes the raw value here instead of
//! dropping it or corrupting typed state. The store preserves everything
//! needed to write the fields back out byte-for-byte: values grouped per
//! field number into per-wire-category lists, each list in encounter
//! order, field numbers serialized ascending with a fixed category order
//! within each number.

use std::hash::{Hash, Hasher};

use filament_bytes::ByteSeq;
use filament_wire::error::{DecodeError, Result};
use filament_wire::{sizing, Tag, WireRead, WireType, WireWriter};

use crate::table::FieldTable;

/// The values recorded for one field number, one list per wire category.
///
/// Multiple occurrences of the same field number are legal and accumulate
/// in the order they were seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownField {
    varints: Vec<u64>,
    fixed32s: Vec<u32>,
    fixed64s: Vec<u64>,
    length_delimited: Vec<ByteSeq>,
    groups: Vec<UnknownFieldStore>,
}

impl UnknownField {
    /// An empty field entry.
    pub fn new() -> UnknownField {
        UnknownField::default()
    }

    /// Varint values in encounter order, widened to 64 bits.
    pub fn varints(&self) -> &[u64] {
        &self.varints
    }

    /// Fixed 32-bit values in encounter order.
    pub fn fixed32s(&self) -> &[u32] {
        &self.fixed32s
    }

    /// Fixed 64-bit values in encounter order.
    pub fn fixed64s(&self) -> &[u64] {
        &self.fixed64s
    }

    /// Length-delimited payloads in encounter order.
    pub fn length_delimited(&self) -> &[ByteSeq] {
        &self.length_delimited
    }

    /// Group-encoded nested field sets in encounter order.
    pub fn groups(&self) -> &[UnknownFieldStore] {
        &self.groups
    }

    /// Whether no value of any category has been recorded.
    pub fn is_empty(&self) -> bool {
        self.varints.is_empty()
            && self.fixed32s.is_empty()
            && self.fixed64s.is_empty()
            && self.length_delimited.is_empty()
            && self.groups.is_empty()
    }

    /// Record a varint value.
    pub fn add_varint(&mut self, value: u64) {
        self.varints.push(value);
    }

    /// Record a fixed 32-bit value.
    pub fn add_fixed32(&mut self, value: u32) {
        self.fixed32s.push(value);
    }

    /// Record a fixed 64-bit value.
    pub fn add_fixed64(&mut self, value: u64) {
        self.fixed64s.push(value);
    }

    /// Record a length-delimited payload.
    pub fn add_length_delimited(&mut self, value: ByteSeq) {
        self.length_delimited.push(value);
    }

    /// Record a group-encoded nested field set.
    pub fn add_group(&mut self, group: UnknownFieldStore) {
        self.groups.push(group);
    }

    /// Append all of `other`'s lists after this entry's own, category by
    /// category.
    pub fn merge(&mut self, other: UnknownField) {
        self.varints.extend(other.varints);
        self.fixed32s.extend(other.fixed32s);
        self.fixed64s.extend(other.fixed64s);
        self.length_delimited.extend(other.length_delimited);
        self.groups.extend(other.groups);
    }

    /// Write every recorded value under `field_number`.
    ///
    /// Categories are written in a fixed order — varints, fixed32s,
    /// fixed64s, length-delimited, groups — each list in encounter order.
    /// Together with ascending field numbers at the store level this makes
    /// reserialization deterministic and byte-exact for canonical input.
    pub fn write_to(&self, field_number: u32, writer: &mut WireWriter) {
        for &value in &self.varints {
            writer.write_tag(field_number, WireType::Varint);
            writer.write_varint64(value);
        }
        for &value in &self.fixed32s {
            writer.write_tag(field_number, WireType::Fixed32);
            writer.write_fixed32(value);
        }
        for &value in &self.fixed64s {
            writer.write_tag(field_number, WireType::Fixed64);
            writer.write_fixed64(value);
        }
        for value in &self.length_delimited {
            writer.write_tag(field_number, WireType::LengthDelimited);
            writer.write_len_prefixed_seq(value);
        }
        for group in &self.groups {
            writer.write_tag(field_number, WireType::StartGroup);
            group.write_to(writer);
            writer.write_tag(field_number, WireType::EndGroup);
        }
    }

    /// Exact number of bytes [`UnknownField::write_to`] produces.
    pub fn serialized_size(&self, field_number: u32) -> usize {
        let mut size = 0;
        for &value in &self.varints {
            size += sizing::varint64_field(field_number, value);
        }
        size += self.fixed32s.len() * sizing::fixed32_field(field_number);
        size += self.fixed64s.len() * sizing::fixed64_field(field_number);
        for value in &self.length_delimited {
            size += sizing::bytes_field(field_number, value.len());
        }
        for group in &self.groups {
            size += sizing::group_field(field_number, group.serialized_size());
        }
        size
    }
}

impl Hash for UnknownField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.varints.hash(state);
        self.fixed32s.hash(state);
        self.fixed64s.hash(state);
        self.length_delimited.hash(state);
        for group in &self.groups {
            group.hash(state);
        }
    }
}

/// Fields preserved from a parse that the parsing schema did not
/// recognize, keyed by field number.
///
/// Equality and hashing are structural over the entries; the store's
/// contents and debug form depend only on the bytes that were parsed,
/// never on which typed schema attempted the parse.
#[derive(Debug, Clone, Default)]
pub struct UnknownFieldStore {
    fields: FieldTable<UnknownField>,
}

impl UnknownFieldStore {
    /// An empty store.
    pub fn new() -> UnknownFieldStore {
        UnknownFieldStore::default()
    }

    /// Whether the store has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of distinct field numbers recorded.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Drop every recorded field.
    pub fn clear(&mut self) {
        self.fields
            .clear()
            .expect("unknown-field storage is never frozen");
    }

    /// The entry for `field_number`, if any value was recorded for it.
    pub fn get(&self, field_number: u32) -> Option<&UnknownField> {
        self.fields.get(field_number)
    }

    /// Iterate entries in ascending field-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &UnknownField)> {
        self.fields.iter()
    }

    fn field_mut(&mut self, field_number: u32) -> &mut UnknownField {
        self.fields
            .get_or_insert_with(field_number, UnknownField::new)
            .expect("unknown-field storage is never frozen")
    }

    /// Record a varint value for `field_number`.
    pub fn merge_varint(&mut self, field_number: u32, value: u64) {
        self.field_mut(field_number).add_varint(value);
    }

    /// Record a fixed 32-bit value for `field_number`.
    pub fn merge_fixed32(&mut self, field_number: u32, value: u32) {
        self.field_mut(field_number).add_fixed32(value);
    }

    /// Record a fixed 64-bit value for `field_number`.
    pub fn merge_fixed64(&mut self, field_number: u32, value: u64) {
        self.field_mut(field_number).add_fixed64(value);
    }

    /// Record a length-delimited payload for `field_number`.
    pub fn merge_length_delimited(&mut self, field_number: u32, value: ByteSeq) {
        self.field_mut(field_number).add_length_delimited(value);
    }

    /// Record a group-encoded nested field set for `field_number`.
    pub fn merge_group(&mut self, field_number: u32, group: UnknownFieldStore) {
        self.field_mut(field_number).add_group(group);
    }

    /// Merge a whole entry into `field_number`: appended after anything
    /// already recorded there, category by category.
    pub fn merge_field(&mut self, field_number: u32, incoming: UnknownField) {
        self.field_mut(field_number).merge(incoming);
    }

    /// Merge every entry of `other` into this store. For each field
    /// number, `other`'s lists land after this store's existing lists.
    pub fn merge_from(&mut self, other: &UnknownFieldStore) {
        for (field_number, field) in other.iter() {
            self.merge_field(field_number, field.clone());
        }
    }

    /// Parse one field introduced by `tag` into the store.
    ///
    /// Returns `false` when `tag` is an end-group tag, which terminates
    /// the caller's scope instead of adding a value. A start-group tag
    /// recursively captures the whole nested group, enforcing balanced,
    /// matching end tags and the reader's recursion limit.
    pub fn merge_field_from<R: WireRead>(&mut self, tag: Tag, reader: &mut R) -> Result<bool> {
        let field_number = tag.field_number();
        match tag.wire_type() {
            WireType::Varint => {
                self.merge_varint(field_number, reader.read_varint64()?);
                Ok(true)
            }
            WireType::Fixed64 => {
                self.merge_fixed64(field_number, reader.read_fixed64()?);
                Ok(true)
            }
            WireType::LengthDelimited => {
                self.merge_length_delimited(field_number, reader.read_bytes()?);
                Ok(true)
            }
            WireType::StartGroup => {
                reader.enter_nested()?;
                let mut group = UnknownFieldStore::new();
                group.merge_until_group_end(field_number, reader)?;
                reader.leave_nested();
                self.merge_group(field_number, group);
                Ok(true)
            }
            WireType::EndGroup => Ok(false),
            WireType::Fixed32 => {
                self.merge_fixed32(field_number, reader.read_fixed32()?);
                Ok(true)
            }
        }
    }

    /// Capture fields until the end tag matching `group_field_number`.
    fn merge_until_group_end<R: WireRead>(
        &mut self,
        group_field_number: u32,
        reader: &mut R,
    ) -> Result<()> {
        loop {
            let tag = reader.read_tag()?.ok_or(DecodeError::Truncated)?;
            if tag.wire_type() == WireType::EndGroup {
                if tag.field_number() != group_field_number {
                    return Err(DecodeError::InvalidEndTag);
                }
                return Ok(());
            }
            self.merge_field_from(tag, reader)?;
        }
    }

    /// Capture every remaining field of the reader's current scope.
    pub fn merge_from_reader<R: WireRead>(&mut self, reader: &mut R) -> Result<()> {
        while let Some(tag) = reader.read_tag()? {
            if !self.merge_field_from(tag, reader)? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Parse a whole scope into a fresh store.
    pub fn parse_from<R: WireRead>(reader: &mut R) -> Result<UnknownFieldStore> {
        let mut store = UnknownFieldStore::new();
        store.merge_from_reader(reader)?;
        Ok(store)
    }

    /// Write every field, ascending by field number.
    pub fn write_to(&self, writer: &mut WireWriter) {
        for (field_number, field) in self.iter() {
            field.write_to(field_number, writer);
        }
    }

    /// Serialize to a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(self.serialized_size());
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Exact number of bytes [`UnknownFieldStore::write_to`] produces.
    pub fn serialized_size(&self) -> usize {
        self.iter()
            .map(|(field_number, field)| field.serialized_size(field_number))
            .sum()
    }
}

impl PartialEq for UnknownFieldStore {
    fn eq(&self, other: &UnknownFieldStore) -> bool {
        self.fields.len() == other.fields.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for UnknownFieldStore {}

impl Hash for UnknownFieldStore {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (field_number, field) in self.iter() {
            field_number.hash(state);
            field.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filament_wire::WireReader;

    fn parse(bytes: &[u8]) -> UnknownFieldStore {
        let mut reader = WireReader::new(bytes);
        UnknownFieldStore::parse_from(&mut reader).unwrap()
    }

    fn canonical_message() -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_tag(1, WireType::Varint);
        w.write_varint64(150);
        w.write_tag(1, WireType::Varint);
        w.write_varint64(151);
        w.write_tag(2, WireType::Fixed32);
        w.write_fixed32(0xAABBCCDD);
        w.write_tag(3, WireType::Fixed64);
        w.write_fixed64(0x1020304050607080);
        w.write_tag(4, WireType::LengthDelimited);
        w.write_len_prefixed(b"opaque");
        w.write_tag(5, WireType::StartGroup);
        w.write_tag(6, WireType::Varint);
        w.write_varint64(1);
        w.write_tag(5, WireType::EndGroup);
        w.into_bytes()
    }

    #[test]
    fn test_parse_routes_by_wire_type() {
        let store = parse(&canonical_message());
        assert_eq!(store.len(), 5);
        assert_eq!(store.get(1).unwrap().varints(), &[150, 151]);
        assert_eq!(store.get(2).unwrap().fixed32s(), &[0xAABBCCDD]);
        assert_eq!(store.get(3).unwrap().fixed64s(), &[0x1020304050607080]);
        assert_eq!(
            store.get(4).unwrap().length_delimited()[0].to_vec(),
            b"opaque"
        );
        let group = &store.get(5).unwrap().groups()[0];
        assert_eq!(group.get(6).unwrap().varints(), &[1]);
    }

    #[test]
    fn test_byte_exact_roundtrip() {
        let original = canonical_message();
        let store = parse(&original);
        assert_eq!(store.to_bytes(), original);
        assert_eq!(store.serialized_size(), original.len());
    }

    #[test]
    fn test_roundtrip_is_stable_across_reparses() {
        let first = parse(&canonical_message());
        let second = parse(&first.to_bytes());
        assert_eq!(first, second);
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn test_out_of_order_input_serializes_ascending() {
        let mut w = WireWriter::new();
        w.write_tag(9, WireType::Varint);
        w.write_varint64(9);
        w.write_tag(2, WireType::Varint);
        w.write_varint64(2);
        w.write_tag(5, WireType::Varint);
        w.write_varint64(5);
        let store = parse(&w.into_bytes());

        let numbers: Vec<u32> = store.iter().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![2, 5, 9]);

        let mut expected = WireWriter::new();
        for n in [2u32, 5, 9] {
            expected.write_tag(n, WireType::Varint);
            expected.write_varint64(n as u64);
        }
        assert_eq!(store.to_bytes(), expected.into_bytes());
    }

    #[test]
    fn test_merge_from_appends_after_existing() {
        let mut a = UnknownFieldStore::new();
        a.merge_varint(1, 10);
        a.merge_varint(1, 11);
        a.merge_varint(3, 30);

        let mut b = UnknownFieldStore::new();
        b.merge_varint(1, 12);
        b.merge_varint(2, 20);

        a.merge_from(&b);
        assert_eq!(a.get(1).unwrap().varints(), &[10, 11, 12]);
        assert_eq!(a.get(2).unwrap().varints(), &[20]);
        assert_eq!(a.get(3).unwrap().varints(), &[30]);
    }

    #[test]
    fn test_merge_field_concatenates_categories() {
        let mut entry = UnknownField::new();
        entry.add_varint(1);
        entry.add_length_delimited(ByteSeq::copy_from_slice(b"x"));

        let mut incoming = UnknownField::new();
        incoming.add_varint(2);
        incoming.add_fixed32(7);

        let mut store = UnknownFieldStore::new();
        store.merge_field(4, entry);
        store.merge_field(4, incoming);

        let merged = store.get(4).unwrap();
        assert_eq!(merged.varints(), &[1, 2]);
        assert_eq!(merged.fixed32s(), &[7]);
        assert_eq!(merged.length_delimited().len(), 1);
    }

    #[test]
    fn test_structural_equality_and_hash() {
        use std::collections::hash_map::DefaultHasher;

        let a = parse(&canonical_message());
        let b = parse(&canonical_message());
        assert_eq!(a, b);

        let hash = |store: &UnknownFieldStore| {
            let mut hasher = DefaultHasher::new();
            store.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash(&a), hash(&b));

        let mut c = parse(&canonical_message());
        c.merge_varint(99, 1);
        assert_ne!(a, c);
    }

    #[test]
    fn test_clear_and_is_empty() {
        let mut store = parse(&canonical_message());
        assert!(!store.is_empty());
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.serialized_size(), 0);
        assert_eq!(store.to_bytes(), Vec::<u8>::new());
    }

    #[test]
    fn test_unterminated_group_fails() {
        let mut w = WireWriter::new();
        w.write_tag(5, WireType::StartGroup);
        w.write_tag(6, WireType::Varint);
        w.write_varint64(1);
        let bytes = w.into_bytes();
        let mut reader = WireReader::new(&bytes);
        assert!(matches!(
            UnknownFieldStore::parse_from(&mut reader),
            Err(DecodeError::Truncated)
        ));
    }

    #[test]
    fn test_mismatched_group_end_fails() {
        let mut w = WireWriter::new();
        w.write_tag(5, WireType::StartGroup);
        w.write_tag(6, WireType::EndGroup);
        let bytes = w.into_bytes();
        let mut reader = WireReader::new(&bytes);
        assert!(matches!(
            UnknownFieldStore::parse_from(&mut reader),
            Err(DecodeError::InvalidEndTag)
        ));
    }

    #[test]
    fn test_deep_group_nesting_respects_recursion_limit() {
        use filament_wire::DecodeLimits;

        let depth = 10;
        let mut w = WireWriter::new();
        for _ in 0..depth {
            w.write_tag(1, WireType::StartGroup);
        }
        for _ in 0..depth {
            w.write_tag(1, WireType::EndGroup);
        }
        let bytes = w.into_bytes();

        let mut ok = WireReader::with_limits(
            &bytes,
            DecodeLimits::default().with_recursion_limit(depth),
        );
        assert!(UnknownFieldStore::parse_from(&mut ok).is_ok());

        let mut too_deep = WireReader::with_limits(
            &bytes,
            DecodeLimits::default().with_recursion_limit(depth - 1),
        );
        assert!(matches!(
            UnknownFieldStore::parse_from(&mut too_deep),
            Err(DecodeError::RecursionLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_nested_group_roundtrip() {
        let mut w = WireWriter::new();
        w.write_tag(1, WireType::StartGroup);
        w.write_tag(2, WireType::StartGroup);
        w.write_tag(3, WireType::Varint);
        w.write_varint64(42);
        w.write_tag(2, WireType::EndGroup);
        w.write_tag(4, WireType::Fixed32);
        w.write_fixed32(7);
        w.write_tag(1, WireType::EndGroup);
        let original = w.into_bytes();

        let store = parse(&original);
        assert_eq!(store.to_bytes(), original);
    }

    #[test]
    fn test_parse_from_stream_reader_matches_slice_reader() {
        use filament_wire::StreamReader;
        use std::io::Cursor;

        let bytes = canonical_message();
        let from_slice = parse(&bytes);
        let mut stream = StreamReader::new(Cursor::new(bytes));
        let from_stream = UnknownFieldStore::parse_from(&mut stream).unwrap();
        assert_eq!(from_slice, from_stream);
    }
}
