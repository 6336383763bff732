//! Metadata table identifiers, row shapes and the Edit-and-Continue bookkeeping tables.
//!
//! A delta does not rewrite whole tables. It carries a handful of rows per table, each
//! tagged with its row id, together with the `EncLog` and `EncMap` tables that tell the
//! runtime loader which rows are new and which replace existing ones.
//!
//! # Key Components
//!
//! - [`TableId`] - ECMA-335 table numbers
//! - [`TableSizes`] - Per-table row counts, used both for absolute sizes and for the
//!   cumulative number of rows added by deltas
//! - [`EncLogRow`] / [`EditAndContinueOperation`] - The operation log of a delta
//! - [`EncMap`] - The sorted, duplicate-free token list of a delta
//! - [`rows`] - Row structures for every table a delta can touch

use std::fmt;
use std::ops::{Index, IndexMut};

use strum::{EnumCount, IntoEnumIterator};

mod enclog;
mod encmap;
pub mod rows;
mod tableid;

pub use enclog::{EditAndContinueOperation, EncLogRow};
pub use encmap::EncMap;
pub use tableid::TableId;

/// Row counts for every metadata table.
///
/// Used for the row counts of the original module, for the cumulative number of rows
/// added by all deltas so far, and for the number of rows a single delta appends.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TableSizes([u32; TableId::COUNT]);

impl TableSizes {
    /// Creates a table size set with every count at zero.
    #[must_use]
    pub fn new() -> Self {
        TableSizes([0; TableId::COUNT])
    }

    /// Adds `other` to `self` table by table.
    #[must_use]
    pub fn plus(&self, other: &TableSizes) -> TableSizes {
        let mut result = *self;
        for table in TableId::iter() {
            result[table] += other[table];
        }
        result
    }

    /// Iterates over all tables with a non-zero count.
    pub fn non_empty(&self) -> impl Iterator<Item = (TableId, u32)> + '_ {
        TableId::iter()
            .map(|table| (table, self[table]))
            .filter(|(_, count)| *count > 0)
    }
}

impl Default for TableSizes {
    fn default() -> Self {
        TableSizes::new()
    }
}

impl Index<TableId> for TableSizes {
    type Output = u32;

    fn index(&self, table: TableId) -> &u32 {
        &self.0[table as usize]
    }
}

impl IndexMut<TableId> for TableSizes {
    fn index_mut(&mut self, table: TableId) -> &mut u32 {
        &mut self.0[table as usize]
    }
}

impl fmt::Debug for TableSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.non_empty()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sizes_index_and_plus() {
        let mut a = TableSizes::new();
        a[TableId::MethodDef] = 3;
        a[TableId::Param] = 2;

        let mut b = TableSizes::new();
        b[TableId::MethodDef] = 1;
        b[TableId::TypeDef] = 4;

        let sum = a.plus(&b);
        assert_eq!(sum[TableId::MethodDef], 4);
        assert_eq!(sum[TableId::Param], 2);
        assert_eq!(sum[TableId::TypeDef], 4);
        assert_eq!(sum[TableId::Field], 0);
    }

    #[test]
    fn test_table_sizes_non_empty() {
        let mut sizes = TableSizes::new();
        sizes[TableId::GenericParamConstraint] = 1;
        sizes[TableId::Module] = 1;

        let tables: Vec<_> = sizes.non_empty().collect();
        assert_eq!(
            tables,
            vec![(TableId::Module, 1), (TableId::GenericParamConstraint, 1)]
        );
    }
}
