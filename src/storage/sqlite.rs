//! SQLite-backed column store.
//!
//! All tables share one `WITHOUT ROWID` table keyed by `(cf, row_key, name)`.
//! SQLite compares BLOBs with `memcmp`, so the primary-key order within a
//! row is the byte order of the encoded column names.

use super::traits::{Column, ColumnRange, ColumnStore};
use crate::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use std::fmt::Write as _;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire mutex lock with poison recovery.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Column store persisted in a `SQLite` database.
pub struct SqliteColumnStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteColumnStore {
    /// Opens (or creates) a store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_store_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        // journal_mode returns a row, so errors are ignored rather than batched
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.busy_timeout(std::time::Duration::from_secs(5));

        conn.execute(
            "CREATE TABLE IF NOT EXISTS columns (
                cf TEXT NOT NULL,
                row_key BLOB NOT NULL,
                name BLOB NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (cf, row_key, name)
            ) WITHOUT ROWID",
            [],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_columns_table".to_string(),
            cause: e.to_string(),
        })?;

        Ok(())
    }
}

fn push_bound(sql: &mut String, values: &mut Vec<Value>, bound: &Bound<Vec<u8>>, lower: bool) {
    let op = match (bound, lower) {
        (Bound::Unbounded, _) => return,
        (Bound::Included(_), true) => ">=",
        (Bound::Excluded(_), true) => ">",
        (Bound::Included(_), false) => "<=",
        (Bound::Excluded(_), false) => "<",
    };
    if let Bound::Included(name) | Bound::Excluded(name) = bound {
        values.push(Value::Blob(name.clone()));
        let _ = write!(sql, " AND name {op} ?{}", values.len());
    }
}

impl ColumnStore for SqliteColumnStore {
    fn put(&self, table: &str, row: &[u8], name: &[u8], value: &[u8]) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO columns (cf, row_key, name, value) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (cf, row_key, name) DO UPDATE SET value = excluded.value",
            params![table, row, name, value],
        )
        .map_err(|e| Error::query_failed("sqlite_put", e))?;
        Ok(())
    }

    fn get(&self, table: &str, row: &[u8], name: &[u8]) -> Result<Option<Vec<u8>>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT value FROM columns WHERE cf = ?1 AND row_key = ?2 AND name = ?3",
            params![table, row, name],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| Error::query_failed("sqlite_get", e))
    }

    fn delete(&self, table: &str, row: &[u8], name: &[u8]) -> Result<bool> {
        let conn = acquire_lock(&self.conn);
        let affected = conn
            .execute(
                "DELETE FROM columns WHERE cf = ?1 AND row_key = ?2 AND name = ?3",
                params![table, row, name],
            )
            .map_err(|e| Error::query_failed("sqlite_delete", e))?;
        Ok(affected > 0)
    }

    fn scan(&self, table: &str, row: &[u8], range: &ColumnRange) -> Result<Vec<Column>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql =
            String::from("SELECT name, value FROM columns WHERE cf = ?1 AND row_key = ?2");
        let mut values = vec![Value::Text(table.to_string()), Value::Blob(row.to_vec())];
        push_bound(&mut sql, &mut values, &range.start, true);
        push_bound(&mut sql, &mut values, &range.end, false);
        values.push(Value::Integer(
            range
                .limit
                .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX)),
        ));
        let _ = write!(sql, " ORDER BY name LIMIT ?{}", values.len());

        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::query_failed("sqlite_scan", e))?;
        let rows = stmt
            .query_map(params_from_iter(values), |r| {
                Ok(Column {
                    name: r.get(0)?,
                    value: r.get(1)?,
                })
            })
            .map_err(|e| Error::query_failed("sqlite_scan", e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::query_failed("sqlite_scan", e))
    }

    fn compare_and_swap(
        &self,
        table: &str,
        row: &[u8],
        name: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::query_failed("sqlite_cas", e))?;

        let current: Option<Vec<u8>> = tx
            .query_row(
                "SELECT value FROM columns WHERE cf = ?1 AND row_key = ?2 AND name = ?3",
                params![table, row, name],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| Error::query_failed("sqlite_cas", e))?;

        if current.as_deref() != expected {
            return Ok(false);
        }

        match new {
            Some(value) => tx.execute(
                "INSERT INTO columns (cf, row_key, name, value) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (cf, row_key, name) DO UPDATE SET value = excluded.value",
                params![table, row, name, value],
            ),
            None => tx.execute(
                "DELETE FROM columns WHERE cf = ?1 AND row_key = ?2 AND name = ?3",
                params![table, row, name],
            ),
        }
        .map_err(|e| Error::query_failed("sqlite_cas", e))?;

        tx.commit()
            .map_err(|e| Error::query_failed("sqlite_cas", e))?;
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_overwrite() {
        let store = SqliteColumnStore::in_memory().expect("open");
        store.put("t", b"r", b"n", b"1").expect("put");
        store.put("t", b"r", b"n", b"2").expect("put");
        assert_eq!(store.get("t", b"r", b"n").expect("get"), Some(b"2".to_vec()));
        assert!(store.delete("t", b"r", b"n").expect("delete"));
        assert_eq!(store.get("t", b"r", b"n").expect("get"), None);
    }

    #[test]
    fn test_scan_uses_byte_order() {
        let store = SqliteColumnStore::in_memory().expect("open");
        let names: [&[u8]; 5] = [&[0x00, 0xFF], &[0x00, 0x00], b"a", &[0xF4], b"a\x00"];
        for name in names {
            store.put("t", b"r", name, b"v").expect("put");
        }
        let scanned: Vec<Vec<u8>> = store
            .scan("t", b"r", &ColumnRange::all())
            .expect("scan")
            .into_iter()
            .map(|c| c.name)
            .collect();
        let mut expected: Vec<Vec<u8>> = names.iter().map(|n| n.to_vec()).collect();
        expected.sort();
        assert_eq!(scanned, expected);
    }

    #[test]
    fn test_scan_bounds_and_limit() {
        let store = SqliteColumnStore::in_memory().expect("open");
        for name in ["a", "b", "c", "d", "e"] {
            store.put("t", b"r", name.as_bytes(), b"v").expect("put");
        }
        store.put("t", b"other", b"c", b"v").expect("put");
        let range =
            ColumnRange::between(Bound::Excluded(b"a".to_vec()), Bound::Excluded(b"e".to_vec()))
                .with_limit(2);
        let names: Vec<Vec<u8>> = store
            .scan("t", b"r", &range)
            .expect("scan")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_compare_and_swap() {
        let store = SqliteColumnStore::in_memory().expect("open");
        assert!(store.compare_and_swap("t", b"r", b"n", None, Some(b"1")).expect("cas"));
        assert!(!store.compare_and_swap("t", b"r", b"n", None, Some(b"1")).expect("cas"));
        assert!(!store.compare_and_swap("t", b"r", b"n", Some(b"x"), None).expect("cas"));
        assert!(store.compare_and_swap("t", b"r", b"n", Some(b"1"), None).expect("cas"));
        assert_eq!(store.get("t", b"r", b"n").expect("get"), None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("reclaim.db");
        {
            let store = SqliteColumnStore::new(&path).expect("open");
            store.put("t", b"r", b"n", b"v").expect("put");
        }
        let store = SqliteColumnStore::new(&path).expect("reopen");
        assert_eq!(store.db_path(), Some(path.as_path()));
        assert_eq!(store.get("t", b"r", b"n").expect("get"), Some(b"v".to_vec()));
    }
}
