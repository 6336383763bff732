//! Row indices of a delta.
//!
//! A [`DefinitionIndexBuilder`] collects the rows of one definition table during the
//! traversal of a generation: rows re-emitted at their existing id and rows appended after
//! the previous generation's last row. [`DefinitionIndexBuilder::freeze`] consumes the
//! builder into an immutable [`DefinitionIndex`] sorted by row id, which is what table
//! population and the `EncLog` read.
//!
//! Reference tables are never updated, only appended to, and deduplicate their entries
//! within one delta; see [`ReferenceIndex`].

use std::collections::HashMap;
use std::hash::Hash;

use crate::{emit::deleted::DefinitionKey, Result};

/// Key of a `MethodImpl` row: implementing method row and 1-based index among the
/// method's `MethodImpl` rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodImplKey {
    /// `MethodDef` row of the implementing method
    pub row: u32,
    /// 1-based index
    pub index: u32,
}

impl MethodImplKey {
    /// Creates a key.
    #[must_use]
    pub fn new(row: u32, index: u32) -> Self {
        MethodImplKey { row, index }
    }
}

/// Key of a `Param` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamKey {
    /// Owning method
    pub method: DefinitionKey,
    /// Parameter sequence
    pub sequence: u16,
}

/// Key of a `GenericParam` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GenericParamKey {
    /// Owning type or method
    pub owner: crate::symbols::SymbolId,
    /// Zero-based ordinal
    pub number: u16,
}

/// A row of a frozen [`DefinitionIndex`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry<K> {
    /// Row id
    pub row: u32,
    /// Definition occupying the row
    pub key: K,
    /// True if the row is new in this generation
    pub added: bool,
}

/// Mutable row index of one definition table.
#[derive(Debug)]
pub struct DefinitionIndexBuilder<K> {
    first_row: u32,
    rows: HashMap<K, u32>,
    added: Vec<K>,
    updated: Vec<(K, u32)>,
}

impl<K: Clone + Eq + Hash + std::fmt::Debug> DefinitionIndexBuilder<K> {
    /// Creates an index whose added rows start at `previous_size + 1`.
    #[must_use]
    pub fn new(previous_size: u32) -> Self {
        DefinitionIndexBuilder {
            first_row: previous_size + 1,
            rows: HashMap::new(),
            added: Vec::new(),
            updated: Vec::new(),
        }
    }

    /// Appends a new row for `key` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if `key` already has a row in this index.
    pub fn add(&mut self, key: K) -> Result<u32> {
        if self.rows.contains_key(&key) {
            return Err(invariant_error!("{:?} was already added to the index", key));
        }

        let row = self.first_row + self.added.len() as u32;
        self.rows.insert(key.clone(), row);
        self.added.push(key);
        Ok(row)
    }

    /// Records that `key` re-emits its existing row `row`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if `key` already has a row in this index or
    /// `row` is not a row of a previous generation.
    pub fn add_updated(&mut self, key: K, row: u32) -> Result<()> {
        if row == 0 || row >= self.first_row {
            return Err(invariant_error!(
                "Row {} of {:?} does not exist in the previous generation",
                row,
                key
            ));
        }
        if self.rows.contains_key(&key) {
            return Err(invariant_error!("{:?} was already added to the index", key));
        }

        self.rows.insert(key.clone(), row);
        self.updated.push((key, row));
        Ok(())
    }

    /// Returns the row of `key` if it was added or updated in this generation.
    #[must_use]
    pub fn try_get(&self, key: &K) -> Option<u32> {
        self.rows.get(key).copied()
    }

    /// Returns true if `key` occupies a new row.
    #[must_use]
    pub fn is_added(&self, key: &K) -> bool {
        self.rows
            .get(key)
            .is_some_and(|row| *row >= self.first_row)
    }

    /// Returns the number of new rows.
    #[must_use]
    pub fn added_count(&self) -> u32 {
        self.added.len() as u32
    }

    /// Consumes the builder into a table sorted by row id.
    #[must_use]
    pub fn freeze(self) -> DefinitionIndex<K> {
        let first_row = self.first_row;
        let mut entries: Vec<IndexEntry<K>> = self
            .updated
            .into_iter()
            .map(|(key, row)| IndexEntry {
                row,
                key,
                added: false,
            })
            .collect();
        entries.sort_by_key(|entry| entry.row);
        entries.extend(self.added.into_iter().enumerate().map(|(offset, key)| IndexEntry {
            row: first_row + offset as u32,
            key,
            added: true,
        }));

        DefinitionIndex {
            entries,
            rows: self.rows,
            first_row,
        }
    }
}

/// Immutable row index of one definition table, sorted by row id.
#[derive(Debug)]
pub struct DefinitionIndex<K> {
    entries: Vec<IndexEntry<K>>,
    rows: HashMap<K, u32>,
    first_row: u32,
}

impl<K: Eq + Hash> DefinitionIndex<K> {
    /// Iterates over all rows in row order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry<K>> {
        self.entries.iter()
    }

    /// Iterates over the new rows in row order.
    pub fn added(&self) -> impl Iterator<Item = &IndexEntry<K>> {
        self.entries.iter().filter(|entry| entry.added)
    }

    /// Returns the row of `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<u32> {
        self.rows.get(key).copied()
    }

    /// Returns the number of new rows.
    #[must_use]
    pub fn added_count(&self) -> u32 {
        self.entries.len() as u32 - self.updated_count()
    }

    /// Returns the number of re-emitted rows.
    #[must_use]
    pub fn updated_count(&self) -> u32 {
        self.entries
            .iter()
            .take_while(|entry| entry.row < self.first_row)
            .count() as u32
    }

    /// Returns the total number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no rows in this generation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deduplicating append-only index of a reference table.
#[derive(Debug)]
pub struct ReferenceIndex<K> {
    first_row: u32,
    rows: HashMap<K, u32>,
    keys: Vec<K>,
}

impl<K: Clone + Eq + Hash> ReferenceIndex<K> {
    /// Creates an index whose rows start at `previous_size + 1`.
    #[must_use]
    pub fn new(previous_size: u32) -> Self {
        ReferenceIndex {
            first_row: previous_size + 1,
            rows: HashMap::new(),
            keys: Vec::new(),
        }
    }

    /// Returns the row of `key`, appending one if the key is new. The flag is true for a
    /// newly appended row.
    pub fn get_or_add(&mut self, key: K) -> (u32, bool) {
        if let Some(row) = self.rows.get(&key) {
            return (*row, false);
        }

        let row = self.first_row + self.keys.len() as u32;
        self.rows.insert(key.clone(), row);
        self.keys.push(key);
        (row, true)
    }

    /// Returns the row of `key` if it was referenced.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<u32> {
        self.rows.get(key).copied()
    }

    /// Iterates over `(row, key)` in row order.
    pub fn rows(&self) -> impl Iterator<Item = (u32, &K)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(offset, key)| (self.first_row + offset as u32, key))
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.keys.len() as u32
    }

    /// Returns true if nothing was referenced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_added_rows_continue_previous_table() {
        let mut index = DefinitionIndexBuilder::new(10);
        assert_eq!(index.add("a").unwrap(), 11);
        assert_eq!(index.add("b").unwrap(), 12);
        index.add_updated("c", 3).unwrap();

        assert!(index.is_added(&"a"));
        assert!(!index.is_added(&"c"));
        assert_eq!(index.try_get(&"c"), Some(3));
        assert_eq!(index.added_count(), 2);

        let frozen = index.freeze();
        let rows: Vec<_> = frozen.entries().map(|entry| (entry.row, entry.added)).collect();
        assert_eq!(rows, vec![(3, false), (11, true), (12, true)]);
        assert_eq!(frozen.added_count(), 2);
        assert_eq!(frozen.updated_count(), 1);
        assert_eq!(frozen.get(&"b"), Some(12));
    }

    #[test]
    fn test_index_misuse_is_an_invariant_error() {
        let mut index = DefinitionIndexBuilder::new(2);
        index.add("a").unwrap();
        assert!(matches!(index.add("a"), Err(crate::Error::Invariant { .. })));
        assert!(index.add_updated("b", 3).is_err());
        assert!(index.add_updated("b", 0).is_err());
        index.add_updated("b", 2).unwrap();
        assert!(index.add_updated("b", 1).is_err());
    }

    #[test]
    fn test_updated_rows_sorted() {
        let mut index = DefinitionIndexBuilder::new(5);
        index.add_updated('x', 4).unwrap();
        index.add_updated('y', 1).unwrap();
        let rows: Vec<_> = index.freeze().entries().map(|entry| entry.row).collect();
        assert_eq!(rows, vec![1, 4]);
    }

    #[test]
    fn test_reference_index_deduplicates() {
        let mut index = ReferenceIndex::new(7);
        assert_eq!(index.get_or_add("System.Runtime"), (8, true));
        assert_eq!(index.get_or_add("System.Console"), (9, true));
        assert_eq!(index.get_or_add("System.Runtime"), (8, false));
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.rows().collect::<Vec<_>>(),
            vec![(8, &"System.Runtime"), (9, &"System.Console")]
        );
    }
}
