//! Field storage for wire-format messages
//!
//! This crate provides the storage structures that sit between the raw
//! codec and a typed message layer:
//!
//! - [`FieldTable`]: a hybrid sorted map tuned for the common case of few
//!   entries — a small inline sorted array overflowing into an ordered
//!   map, with deterministic ascending iteration and a one-way
//!   immutability freeze
//! - [`UnknownFieldStore`]: lossless capture of fields a schema does not
//!   recognize, preserving them byte-exactly through
//!   parse → mutate → reserialize round trips
//! - [`ExtensionSet`]: typed values attached to numbered slots outside a
//!   base message definition
//! - [`Lazy`]: a cell deferring the decode of a nested payload until it
//!   is first needed, memoizing the result

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod extension;
pub mod lazy;
pub mod table;
pub mod unknown;

pub use extension::{ExtensionError, ExtensionSet, ExtensionValue, FieldType};
pub use lazy::Lazy;
pub use table::{FieldTable, FrozenError};
pub use unknown::{UnknownField, UnknownFieldStore};
