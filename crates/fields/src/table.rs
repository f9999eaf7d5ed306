//! Hybrid sorted map over field numbers.
//!
//! Messages usually carry only a handful of extension or unknown fields,
//! so the table keeps its first entries in a small sorted inline array
//! (binary-searched, no heap indirection) and spills the rest into an
//! ordered map. Every key in the array is less than or equal to every key
//! in the overflow map, so walking array-then-overflow visits all entries
//! in one globally ascending sequence — the order serialization depends
//! on.

use std::collections::BTreeMap;

use smallvec::SmallVec;
use thiserror::Error;

/// Default capacity of the inline sorted array.
pub const DEFAULT_ARRAY_CAPACITY: usize = 8;

/// Error returned when mutating a frozen table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("field table is immutable")]
pub struct FrozenError;

/// A map from field number to `V` with ascending iteration, optimized for
/// few entries.
///
/// [`FieldTable::make_immutable`] permanently freezes the table: every
/// later mutation, including through `get_mut` and `iter_mut`, fails with
/// [`FrozenError`]. The transition is one-way.
#[derive(Debug, Clone)]
pub struct FieldTable<V> {
    /// The smallest keys, sorted ascending. Bounded by `array_capacity`.
    array: SmallVec<[(u32, V); DEFAULT_ARRAY_CAPACITY]>,
    /// Entries past the array; every key here is >= every array key.
    overflow: BTreeMap<u32, V>,
    array_capacity: usize,
    frozen: bool,
}

impl<V> Default for FieldTable<V> {
    fn default() -> Self {
        FieldTable::new()
    }
}

impl<V> FieldTable<V> {
    /// Create an empty table with the default array capacity.
    pub fn new() -> FieldTable<V> {
        FieldTable::with_array_capacity(DEFAULT_ARRAY_CAPACITY)
    }

    /// Create an empty table with an explicit inline-array capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_array_capacity(capacity: usize) -> FieldTable<V> {
        assert!(capacity > 0, "array capacity must be at least 1");
        FieldTable {
            array: SmallVec::new(),
            overflow: BTreeMap::new(),
            array_capacity: capacity,
            frozen: false,
        }
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.array.len() + self.overflow.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.overflow.is_empty()
    }

    /// Number of entries currently held in the inline array.
    pub fn num_array_entries(&self) -> usize {
        self.array.len()
    }

    /// Number of entries currently held in the overflow map.
    pub fn num_overflow_entries(&self) -> usize {
        self.overflow.len()
    }

    /// Permanently freeze the table. Idempotent; there is no unfreeze.
    pub fn make_immutable(&mut self) {
        self.frozen = true;
    }

    /// Whether the table has been frozen.
    pub fn is_immutable(&self) -> bool {
        self.frozen
    }

    fn check_mutable(&self) -> Result<(), FrozenError> {
        if self.frozen {
            Err(FrozenError)
        } else {
            Ok(())
        }
    }

    fn array_search(&self, key: u32) -> std::result::Result<usize, usize> {
        self.array.binary_search_by_key(&key, |&(k, _)| k)
    }

    /// Look up a value.
    pub fn get(&self, key: u32) -> Option<&V> {
        match self.array_search(key) {
            Ok(index) => Some(&self.array[index].1),
            Err(_) => self.overflow.get(&key),
        }
    }

    /// Whether the table holds an entry for `key`.
    pub fn contains_key(&self, key: u32) -> bool {
        self.get(key).is_some()
    }

    /// Look up a value for mutation. Fails on a frozen table even when
    /// the key is absent, because the returned reference would permit
    /// mutation.
    pub fn get_mut(&mut self, key: u32) -> Result<Option<&mut V>, FrozenError> {
        self.check_mutable()?;
        match self.array_search(key) {
            Ok(index) => Ok(Some(&mut self.array[index].1)),
            Err(_) => Ok(self.overflow.get_mut(&key)),
        }
    }

    /// Insert or replace the value for `key`, returning the previous
    /// value if one existed.
    pub fn put(&mut self, key: u32, value: V) -> Result<Option<V>, FrozenError> {
        self.check_mutable()?;

        match self.array_search(key) {
            Ok(index) => {
                let old = std::mem::replace(&mut self.array[index].1, value);
                return Ok(Some(old));
            }
            Err(insertion_point) => {
                if let Some(slot) = self.overflow.get_mut(&key) {
                    let old = std::mem::replace(slot, value);
                    return Ok(Some(old));
                }

                let belongs_in_overflow = self
                    .overflow
                    .keys()
                    .next()
                    .is_some_and(|&smallest| key > smallest);

                if belongs_in_overflow || insertion_point >= self.array_capacity {
                    self.overflow.insert(key, value);
                } else if self.array.len() == self.array_capacity {
                    // The key fits inside the array range: make room by
                    // moving the array's largest entry into overflow.
                    let (evicted_key, evicted_value) =
                        self.array.pop().expect("array is full, never empty");
                    self.overflow.insert(evicted_key, evicted_value);
                    self.array.insert(insertion_point, (key, value));
                } else {
                    self.array.insert(insertion_point, (key, value));
                }
            }
        }
        Ok(None)
    }

    /// Get the value for `key`, inserting one first if absent.
    pub fn get_or_insert_with(
        &mut self,
        key: u32,
        default: impl FnOnce() -> V,
    ) -> Result<&mut V, FrozenError> {
        if !self.contains_key(key) {
            self.put(key, default())?;
        } else {
            self.check_mutable()?;
        }
        match self.array_search(key) {
            Ok(index) => Ok(&mut self.array[index].1),
            Err(_) => Ok(self
                .overflow
                .get_mut(&key)
                .expect("entry present after insert")),
        }
    }

    /// Remove the entry for `key`, returning its value.
    ///
    /// Removal never pulls entries back from overflow into the array: the
    /// array simply shrinks, observable through
    /// [`FieldTable::num_array_entries`].
    pub fn remove(&mut self, key: u32) -> Result<Option<V>, FrozenError> {
        self.check_mutable()?;
        match self.array_search(key) {
            Ok(index) => Ok(Some(self.array.remove(index).1)),
            Err(_) => Ok(self.overflow.remove(&key)),
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) -> Result<(), FrozenError> {
        self.check_mutable()?;
        self.array.clear();
        self.overflow.clear();
        Ok(())
    }

    /// Iterate entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &V)> {
        self.array
            .iter()
            .map(|(k, v)| (*k, v))
            .chain(self.overflow.iter().map(|(k, v)| (*k, v)))
    }

    /// Iterate entries mutably in ascending key order.
    pub fn iter_mut(
        &mut self,
    ) -> Result<impl Iterator<Item = (u32, &mut V)>, FrozenError> {
        self.check_mutable()?;
        Ok(self
            .array
            .iter_mut()
            .map(|(k, v)| (*k, v))
            .chain(self.overflow.iter_mut().map(|(k, v)| (*k, v))))
    }

    /// Iterate keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Iterate values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }
}
