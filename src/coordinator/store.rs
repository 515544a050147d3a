//! Lease locks kept in the column store.
//!
//! Every lock is one JSON record in [`GLOBAL_LOCK_TABLE`], row = lock name.
//! All transitions go through `compare_and_swap` against the bytes read a
//! moment earlier, so two nodes racing for the same lock cannot both win.

use super::{LockRecord, LockService};
use crate::storage::ColumnStore;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Table holding lock records.
pub const GLOBAL_LOCK_TABLE: &str = "GlobalLock";

const LOCK_COLUMN: &[u8] = b"lock";

/// Lock service backed by a shared [`ColumnStore`].
#[derive(Clone)]
pub struct StoreLockService {
    store: Arc<dyn ColumnStore>,
}

impl StoreLockService {
    /// Creates a lock service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ColumnStore>) -> Self {
        Self { store }
    }

    fn read(&self, name: &str) -> Result<Option<(Vec<u8>, Option<LockRecord>)>> {
        let Some(bytes) = self.store.get(GLOBAL_LOCK_TABLE, name.as_bytes(), LOCK_COLUMN)? else {
            return Ok(None);
        };
        // An unreadable record is treated as expired so it cannot wedge the lock.
        let record = match serde_json::from_slice::<LockRecord>(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(lock = name, error = %e, "Discarding unreadable lock record");
                None
            },
        };
        Ok(Some((bytes, record)))
    }
}

impl LockService for StoreLockService {
    fn try_acquire(&self, name: &str, owner: &str, lease: Duration) -> Result<bool> {
        let current = self.read(name)?;
        if let Some((_, Some(held))) = &current
            && !held.is_expired()
        {
            return Ok(false);
        }

        let record = serde_json::to_vec(&LockRecord::new(owner, lease)).map_err(|e| {
            Error::OperationFailed {
                operation: "serialize_lock".to_string(),
                cause: e.to_string(),
            }
        })?;
        let expected = current.as_ref().map(|(bytes, _)| bytes.as_slice());
        self.store.compare_and_swap(
            GLOBAL_LOCK_TABLE,
            name.as_bytes(),
            LOCK_COLUMN,
            expected,
            Some(&record),
        )
    }

    fn release(&self, name: &str, owner: &str) -> Result<bool> {
        match self.read(name)? {
            Some((bytes, Some(held))) if held.owner == owner => self.store.compare_and_swap(
                GLOBAL_LOCK_TABLE,
                name.as_bytes(),
                LOCK_COLUMN,
                Some(&bytes),
                None,
            ),
            _ => Ok(false),
        }
    }

    fn renew(&self, name: &str, owner: &str, lease: Duration) -> Result<bool> {
        let Some((bytes, Some(held))) = self.read(name)? else {
            return Ok(false);
        };
        if held.owner != owner {
            return Ok(false);
        }
        let record = serde_json::to_vec(&LockRecord::new(owner, lease)).map_err(|e| {
            Error::OperationFailed {
                operation: "serialize_lock".to_string(),
                cause: e.to_string(),
            }
        })?;
        self.store.compare_and_swap(
            GLOBAL_LOCK_TABLE,
            name.as_bytes(),
            LOCK_COLUMN,
            Some(&bytes),
            Some(&record),
        )
    }

    fn holder(&self, name: &str) -> Result<Option<LockRecord>> {
        Ok(self
            .read(name)?
            .and_then(|(_, record)| record)
            .filter(|record| !record.is_expired()))
    }
}
