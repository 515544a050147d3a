//! Sorted-column store trait.

use crate::Result;
use std::ops::Bound;

/// One stored column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name; rows keep their columns sorted by name bytes.
    pub name: Vec<u8>,
    /// Column value.
    pub value: Vec<u8>,
}

impl Column {
    /// Creates a column.
    #[must_use]
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A bounded slice of one row's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRange {
    /// Lower bound on column names.
    pub start: Bound<Vec<u8>>,
    /// Upper bound on column names.
    pub end: Bound<Vec<u8>>,
    /// Maximum number of columns to return; `None` is unbounded.
    pub limit: Option<usize>,
}

impl ColumnRange {
    /// The whole row.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
            limit: None,
        }
    }

    /// Columns between `start` and `end`.
    #[must_use]
    pub const fn between(start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Self {
        Self {
            start,
            end,
            limit: None,
        }
    }

    /// Columns whose names start with `prefix`.
    #[must_use]
    pub fn prefix(prefix: Vec<u8>) -> Self {
        let (start, end) = crate::index::prefix_bounds(prefix);
        Self::between(start, end)
    }

    /// Caps the number of returned columns.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if `name` lies inside the bounds (the limit is ignored).
    #[must_use]
    pub fn contains(&self, name: &[u8]) -> bool {
        let after_start = match &self.start {
            Bound::Included(s) => name >= s.as_slice(),
            Bound::Excluded(s) => name > s.as_slice(),
            Bound::Unbounded => true,
        };
        let before_end = match &self.end {
            Bound::Included(e) => name <= e.as_slice(),
            Bound::Excluded(e) => name < e.as_slice(),
            Bound::Unbounded => true,
        };
        after_start && before_end
    }

    /// Returns `true` if no column name can satisfy the bounds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        if self.limit == Some(0) {
            return true;
        }
        match (&self.start, &self.end) {
            (Bound::Included(s), Bound::Included(e)) => s > e,
            (Bound::Included(s) | Bound::Excluded(s), Bound::Excluded(e))
            | (Bound::Excluded(s), Bound::Included(e)) => s >= e,
            _ => false,
        }
    }
}

impl Default for ColumnRange {
    fn default() -> Self {
        Self::all()
    }
}

/// A keyed, sorted-column store.
///
/// Data is addressed as `table / row / column`. Within a row, columns are
/// kept in byte order of their names so ranged reads are cheap. Every
/// operation is safe for concurrent use from multiple threads.
pub trait ColumnStore: Send + Sync {
    /// Writes (or overwrites) one column.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the write fails.
    fn put(&self, table: &str, row: &[u8], name: &[u8], value: &[u8]) -> Result<()>;

    /// Reads one column.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the read fails.
    fn get(&self, table: &str, row: &[u8], name: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Deletes one column, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the delete fails.
    fn delete(&self, table: &str, row: &[u8], name: &[u8]) -> Result<bool>;

    /// Returns the columns of one row inside `range`, in ascending name order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the scan fails.
    fn scan(&self, table: &str, row: &[u8], range: &ColumnRange) -> Result<Vec<Column>>;

    /// Atomically replaces a column if its current value equals `expected`.
    ///
    /// `expected == None` means "column must be absent"; `new == None`
    /// deletes the column. Returns `true` if the swap happened.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the store fails.
    fn compare_and_swap(
        &self,
        table: &str,
        row: &[u8],
        name: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool>;

    /// Returns the backend name for logs and metrics.
    fn backend_name(&self) -> &'static str {
        "column_store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let range =
            ColumnRange::between(Bound::Excluded(b"b".to_vec()), Bound::Included(b"d".to_vec()));
        assert!(!range.contains(b"a"));
        assert!(!range.contains(b"b"));
        assert!(range.contains(b"c"));
        assert!(range.contains(b"d"));
        assert!(!range.contains(b"e"));
        assert!(ColumnRange::all().contains(b""));
    }

    #[test]
    fn test_is_empty() {
        assert!(!ColumnRange::all().is_empty());
        assert!(ColumnRange::all().with_limit(0).is_empty());
        assert!(
            ColumnRange::between(Bound::Excluded(b"b".to_vec()), Bound::Excluded(b"b".to_vec()))
                .is_empty()
        );
        assert!(
            ColumnRange::between(Bound::Included(b"c".to_vec()), Bound::Included(b"b".to_vec()))
                .is_empty()
        );
        assert!(
            !ColumnRange::between(Bound::Included(b"b".to_vec()), Bound::Included(b"b".to_vec()))
                .is_empty()
        );
    }

    #[test]
    fn test_prefix_range() {
        let range = ColumnRange::prefix(b"ab".to_vec());
        assert!(range.contains(b"ab"));
        assert!(range.contains(b"abz"));
        assert!(!range.contains(b"ac"));
        assert!(!range.contains(b"aa"));
    }
}
