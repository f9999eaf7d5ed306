//! Typed extension slots.
//!
//! Extensions attach typed values to numbered slots outside a base
//! message definition. The declaration that binds a slot to a type lives
//! in a descriptor layer outside this crate; here it arrives as an
//! explicit [`FieldType`] per call, which selects the wire encoding
//! (plain varint, zigzag varint, fixed-width, or length-delimited).

use filament_bytes::ByteSeq;
use filament_wire::error::Result as WireResult;
use filament_wire::{sizing, varint, WireRead, WireType, WireWriter};
use thiserror::Error;

use crate::table::{FieldTable, FrozenError};

/// Declared scalar type of an extension slot.
///
/// The type fixes both the wire type and the integer transform: `SInt*`
/// use zigzag varints, `SFixed*` are little-endian fixed-width, `Int*`
/// and `UInt*` are plain varints (with `Int32` sign-extended to 64 bits
/// on the wire, as 32-bit varint semantics require).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Signed 32-bit, plain varint (sign-extended when negative).
    Int32,
    /// Signed 64-bit, plain varint.
    Int64,
    /// Unsigned 32-bit varint.
    UInt32,
    /// Unsigned 64-bit varint.
    UInt64,
    /// Signed 32-bit, zigzag varint.
    SInt32,
    /// Signed 64-bit, zigzag varint.
    SInt64,
    /// Single-byte varint 0 or 1.
    Bool,
    /// Unsigned 32-bit, fixed width.
    Fixed32,
    /// Unsigned 64-bit, fixed width.
    Fixed64,
    /// Signed 32-bit, fixed width.
    SFixed32,
    /// Signed 64-bit, fixed width.
    SFixed64,
    /// 32-bit float, fixed width.
    Float,
    /// 64-bit float, fixed width.
    Double,
    /// Raw length-delimited bytes.
    Bytes,
    /// Length-delimited UTF-8 text.
    String,
}

impl FieldType {
    /// The wire type this field type is framed with.
    pub fn wire_type(self) -> WireType {
        match self {
            FieldType::Int32
            | FieldType::Int64
            | FieldType::UInt32
            | FieldType::UInt64
            | FieldType::SInt32
            | FieldType::SInt64
            | FieldType::Bool => WireType::Varint,
            FieldType::Fixed32 | FieldType::SFixed32 | FieldType::Float => WireType::Fixed32,
            FieldType::Fixed64 | FieldType::SFixed64 | FieldType::Double => WireType::Fixed64,
            FieldType::Bytes | FieldType::String => WireType::LengthDelimited,
        }
    }
}

/// A typed extension value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionValue {
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// Boolean.
    Bool(bool),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Raw bytes.
    Bytes(ByteSeq),
    /// UTF-8 text.
    String(String),
}

impl ExtensionValue {
    /// Whether this value is the shape `field_type` declares.
    pub fn matches(&self, field_type: FieldType) -> bool {
        matches!(
            (field_type, self),
            (FieldType::Int32, ExtensionValue::Int32(_))
                | (FieldType::SInt32, ExtensionValue::Int32(_))
                | (FieldType::SFixed32, ExtensionValue::Int32(_))
                | (FieldType::Int64, ExtensionValue::Int64(_))
                | (FieldType::SInt64, ExtensionValue::Int64(_))
                | (FieldType::SFixed64, ExtensionValue::Int64(_))
                | (FieldType::UInt32, ExtensionValue::UInt32(_))
                | (FieldType::Fixed32, ExtensionValue::UInt32(_))
                | (FieldType::UInt64, ExtensionValue::UInt64(_))
                | (FieldType::Fixed64, ExtensionValue::UInt64(_))
                | (FieldType::Bool, ExtensionValue::Bool(_))
                | (FieldType::Float, ExtensionValue::Float(_))
                | (FieldType::Double, ExtensionValue::Double(_))
                | (FieldType::Bytes, ExtensionValue::Bytes(_))
                | (FieldType::String, ExtensionValue::String(_))
        )
    }

    /// Decode a value of the given declared type from a reader positioned
    /// after the field's tag.
    pub fn read_from<R: WireRead>(field_type: FieldType, reader: &mut R) -> WireResult<ExtensionValue> {
        Ok(match field_type {
            FieldType::Int32 => ExtensionValue::Int32(reader.read_varint32()? as i32),
            FieldType::Int64 => ExtensionValue::Int64(reader.read_varint64()? as i64),
            FieldType::UInt32 => ExtensionValue::UInt32(reader.read_varint32()?),
            FieldType::UInt64 => ExtensionValue::UInt64(reader.read_varint64()?),
            FieldType::SInt32 => {
                ExtensionValue::Int32(varint::zigzag_decode32(reader.read_varint32()?))
            }
            FieldType::SInt64 => {
                ExtensionValue::Int64(varint::zigzag_decode64(reader.read_varint64()?))
            }
            FieldType::Bool => ExtensionValue::Bool(reader.read_varint64()? != 0),
            FieldType::Fixed32 => ExtensionValue::UInt32(reader.read_fixed32()?),
            FieldType::Fixed64 => ExtensionValue::UInt64(reader.read_fixed64()?),
            FieldType::SFixed32 => ExtensionValue::Int32(reader.read_fixed32()? as i32),
            FieldType::SFixed64 => ExtensionValue::Int64(reader.read_fixed64()? as i64),
            FieldType::Float => ExtensionValue::Float(f32::from_bits(reader.read_fixed32()?)),
            FieldType::Double => ExtensionValue::Double(f64::from_bits(reader.read_fixed64()?)),
            FieldType::Bytes => ExtensionValue::Bytes(reader.read_bytes()?),
            FieldType::String => ExtensionValue::String(reader.read_string()?),
        })
    }
}

/// Errors from extension-set operations.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The value's shape does not match the declared field type.
    #[error("value does not match the declared field type")]
    TypeMismatch,

    /// The set has been frozen.
    #[error(transparent)]
    Frozen(#[from] FrozenError),
}

/// One extension slot: the declared type plus its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionEntry {
    field_type: FieldType,
    value: ExtensionValue,
}

impl ExtensionEntry {
    /// The declared field type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// The current value.
    pub fn value(&self) -> &ExtensionValue {
        &self.value
    }
}

/// Typed values attached to numbered extension slots.
///
/// Serialization walks slots in ascending field-number order.
/// [`ExtensionSet::make_immutable`] freezes the set permanently.
#[derive(Debug, Clone, Default)]
pub struct ExtensionSet {
    table: FieldTable<ExtensionEntry>,
}

impl ExtensionSet {
    /// An empty set.
    pub fn new() -> ExtensionSet {
        ExtensionSet::default()
    }

    /// Whether no slot holds a value.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of slots holding a value.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Set the value of a slot.
    ///
    /// Fails with [`ExtensionError::TypeMismatch`] when the value's shape
    /// does not agree with `field_type`, and with a frozen error after
    /// [`ExtensionSet::make_immutable`].
    pub fn set(
        &mut self,
        field_number: u32,
        field_type: FieldType,
        value: ExtensionValue,
    ) -> std::result::Result<(), ExtensionError> {
        if !value.matches(field_type) {
            return Err(ExtensionError::TypeMismatch);
        }
        self.table
            .put(field_number, ExtensionEntry { field_type, value })?;
        Ok(())
    }

    /// The slot for `field_number`, if set.
    pub fn get(&self, field_number: u32) -> Option<&ExtensionEntry> {
        self.table.get(field_number)
    }

    /// Clear one slot, returning its previous entry.
    pub fn clear_field(
        &mut self,
        field_number: u32,
    ) -> std::result::Result<Option<ExtensionEntry>, FrozenError> {
        self.table.remove(field_number)
    }

    /// Iterate slots in ascending field-number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ExtensionEntry)> {
        self.table.iter()
    }

    /// Permanently freeze the set.
    pub fn make_immutable(&mut self) {
        self.table.make_immutable();
    }

    /// Whether the set has been frozen.
    pub fn is_immutable(&self) -> bool {
        self.table.is_immutable()
    }

    /// Write every slot, ascending by field number.
    pub fn write_to(&self, writer: &mut WireWriter) {
        for (field_number, entry) in self.iter() {
            writer.write_tag(field_number, entry.field_type.wire_type());
            match (&entry.value, entry.field_type) {
                (ExtensionValue::Int32(v), FieldType::SInt32) => writer.write_sint32(*v),
                (ExtensionValue::Int32(v), FieldType::SFixed32) => {
                    writer.write_fixed32(*v as u32)
                }
                // Plain int32 sign-extends to 64 bits on the wire.
                (ExtensionValue::Int32(v), _) => writer.write_varint64(*v as i64 as u64),
                (ExtensionValue::Int64(v), FieldType::SInt64) => writer.write_sint64(*v),
                (ExtensionValue::Int64(v), FieldType::SFixed64) => {
                    writer.write_fixed64(*v as u64)
                }
                (ExtensionValue::Int64(v), _) => writer.write_varint64(*v as u64),
                (ExtensionValue::UInt32(v), FieldType::Fixed32) => writer.write_fixed32(*v),
                (ExtensionValue::UInt32(v), _) => writer.write_varint32(*v),
                (ExtensionValue::UInt64(v), FieldType::Fixed64) => writer.write_fixed64(*v),
                (ExtensionValue::UInt64(v), _) => writer.write_varint64(*v),
                (ExtensionValue::Bool(v), _) => writer.write_bool(*v),
                (ExtensionValue::Float(v), _) => writer.write_float(*v),
                (ExtensionValue::Double(v), _) => writer.write_double(*v),
                (ExtensionValue::Bytes(v), _) => writer.write_len_prefixed_seq(v),
                (ExtensionValue::String(v), _) => writer.write_len_prefixed(v.as_bytes()),
            }
        }
    }

    /// Serialize to a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = WireWriter::with_capacity(self.serialized_size());
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Exact number of bytes [`ExtensionSet::write_to`] produces.
    pub fn serialized_size(&self) -> usize {
        self.iter()
            .map(|(field_number, entry)| {
                sizing::tag(field_number)
                    + match (&entry.value, entry.field_type) {
                        (ExtensionValue::Int32(v), FieldType::SInt32) => sizing::sint32(*v),
                        (ExtensionValue::Int32(_), FieldType::SFixed32) => sizing::fixed32(),
                        (ExtensionValue::Int32(v), _) => sizing::varint64(*v as i64 as u64),
                        (ExtensionValue::Int64(v), FieldType::SInt64) => sizing::sint64(*v),
                        (ExtensionValue::Int64(_), FieldType::SFixed64) => sizing::fixed64(),
                        (ExtensionValue::Int64(v), _) => sizing::varint64(*v as u64),
                        (ExtensionValue::UInt32(_), FieldType::Fixed32) => sizing::fixed32(),
                        (ExtensionValue::UInt32(v), _) => sizing::varint32(*v),
                        (ExtensionValue::UInt64(_), FieldType::Fixed64) => sizing::fixed64(),
                        (ExtensionValue::UInt64(v), _) => sizing::varint64(*v),
                        (ExtensionValue::Bool(_), _) => sizing::bool(),
                        (ExtensionValue::Float(_), _) => sizing::fixed32(),
                        (ExtensionValue::Double(_), _) => sizing::fixed64(),
                        (ExtensionValue::Bytes(v), _) => sizing::len_prefixed(v.len()),
                        (ExtensionValue::String(v), _) => sizing::len_prefixed(v.len()),
                    }
            })
            .sum()
    }

    /// Parse a scope against a slot-type table supplied by the caller.
    ///
    /// `declared` maps a field number to its declared type; fields with no
    /// declaration, or whose wire type disagrees with the declaration,
    /// land in `unknown` untouched instead of corrupting typed slots.
    pub fn parse_from<R: WireRead>(
        reader: &mut R,
        declared: impl Fn(u32) -> Option<FieldType>,
        unknown: &mut crate::unknown::UnknownFieldStore,
    ) -> WireResult<ExtensionSet> {
        let mut set = ExtensionSet::new();
        while let Some(tag) = reader.read_tag()? {
            match declared(tag.field_number()) {
                Some(field_type) if field_type.wire_type() == tag.wire_type() => {
                    let value = ExtensionValue::read_from(field_type, reader)?;
                    set.set(tag.field_number(), field_type, value)
                        .expect("freshly decoded value matches its declared type");
                }
                _ => {
                    if !unknown.merge_field_from(tag, reader)? {
                        break;
                    }
                }
            }
        }
        Ok(set)
    }
}
