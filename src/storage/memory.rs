//! In-process column store.

use super::traits::{Column, ColumnRange, ColumnStore};
use crate::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Row = BTreeMap<Vec<u8>, Vec<u8>>;
type Table = HashMap<Vec<u8>, Row>;

/// Column store backed by ordered in-memory maps.
///
/// Used for tests, benchmarks and single-node experiments.
#[derive(Debug, Default)]
pub struct MemoryColumnStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryColumnStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of columns stored in one row.
    #[must_use]
    pub fn row_len(&self, table: &str, row: &[u8]) -> usize {
        self.read()
            .get(table)
            .and_then(|t| t.get(row))
            .map_or(0, BTreeMap::len)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Table>> {
        self.tables.read().unwrap_or_else(|poisoned| {
            tracing::warn!("memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Table>> {
        self.tables.write().unwrap_or_else(|poisoned| {
            tracing::warn!("memory store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl ColumnStore for MemoryColumnStore {
    fn put(&self, table: &str, row: &[u8], name: &[u8], value: &[u8]) -> Result<()> {
        self.write()
            .entry(table.to_string())
            .or_default()
            .entry(row.to_vec())
            .or_default()
            .insert(name.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, table: &str, row: &[u8], name: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read()
            .get(table)
            .and_then(|t| t.get(row))
            .and_then(|r| r.get(name))
            .cloned())
    }

    fn delete(&self, table: &str, row: &[u8], name: &[u8]) -> Result<bool> {
        let mut tables = self.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(false);
        };
        let Some(columns) = rows.get_mut(row) else {
            return Ok(false);
        };
        let removed = columns.remove(name).is_some();
        if columns.is_empty() {
            rows.remove(row);
        }
        Ok(removed)
    }

    fn scan(&self, table: &str, row: &[u8], range: &ColumnRange) -> Result<Vec<Column>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let tables = self.read();
        let Some(columns) = tables.get(table).and_then(|t| t.get(row)) else {
            return Ok(Vec::new());
        };
        let limit = range.limit.unwrap_or(usize::MAX);
        Ok(columns
            .range((range.start.clone(), range.end.clone()))
            .take(limit)
            .map(|(name, value)| Column::new(name.clone(), value.clone()))
            .collect())
    }

    fn compare_and_swap(
        &self,
        table: &str,
        row: &[u8],
        name: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool> {
        let mut tables = self.write();
        let columns = tables
            .entry(table.to_string())
            .or_default()
            .entry(row.to_vec())
            .or_default();

        if columns.get(name).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        match new {
            Some(value) => {
                columns.insert(name.to_vec(), value.to_vec());
            },
            None => {
                columns.remove(name);
            },
        }
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Bound;

    fn seeded() -> MemoryColumnStore {
        let store = MemoryColumnStore::new();
        for name in ["a", "b", "c", "d"] {
            store
                .put("t", b"row", name.as_bytes(), b"v")
                .expect("put succeeds");
        }
        store
    }

    #[test]
    fn test_put_get_delete() {
        let store = seeded();
        assert_eq!(store.get("t", b"row", b"a").expect("get"), Some(b"v".to_vec()));
        assert!(store.delete("t", b"row", b"a").expect("delete"));
        assert!(!store.delete("t", b"row", b"a").expect("delete"));
        assert_eq!(store.get("t", b"row", b"a").expect("get"), None);
        assert_eq!(store.get("missing", b"row", b"a").expect("get"), None);
    }

    #[test]
    fn test_scan_is_ordered_and_bounded() {
        let store = seeded();
        let range = ColumnRange::between(Bound::Excluded(b"a".to_vec()), Bound::Unbounded)
            .with_limit(2);
        let names: Vec<Vec<u8>> = store
            .scan("t", b"row", &range)
            .expect("scan")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_scan_degenerate_range_is_empty() {
        let store = seeded();
        let range =
            ColumnRange::between(Bound::Excluded(b"c".to_vec()), Bound::Excluded(b"b".to_vec()));
        assert!(store.scan("t", b"row", &range).expect("scan").is_empty());
    }

    #[test]
    fn test_compare_and_swap() {
        let store = MemoryColumnStore::new();
        assert!(store.compare_and_swap("t", b"r", b"n", None, Some(b"1")).expect("cas"));
        assert!(!store.compare_and_swap("t", b"r", b"n", None, Some(b"2")).expect("cas"));
        assert!(
            store
                .compare_and_swap("t", b"r", b"n", Some(b"1"), Some(b"2"))
                .expect("cas")
        );
        assert!(store.compare_and_swap("t", b"r", b"n", Some(b"2"), None).expect("cas"));
        assert_eq!(store.get("t", b"r", b"n").expect("get"), None);
    }

    #[test]
    fn test_row_len() {
        let store = seeded();
        assert_eq!(store.row_len("t", b"row"), 4);
        assert_eq!(store.row_len("t", b"other"), 0);
    }
}
