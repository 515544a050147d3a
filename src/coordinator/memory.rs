//! In-process lock service.

use super::{LockRecord, LockService};
use crate::Result;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Lock service for a single process.
#[derive(Debug, Default)]
pub struct MemoryLockService {
    locks: Mutex<HashMap<String, LockRecord>>,
}

impl MemoryLockService {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<String, LockRecord>> {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LockService for MemoryLockService {
    fn try_acquire(&self, name: &str, owner: &str, lease: Duration) -> Result<bool> {
        let mut locks = self.locks();
        if locks.get(name).is_some_and(|held| !held.is_expired()) {
            return Ok(false);
        }
        locks.insert(name.to_string(), LockRecord::new(owner, lease));
        Ok(true)
    }

    fn release(&self, name: &str, owner: &str) -> Result<bool> {
        let mut locks = self.locks();
        if locks.get(name).is_some_and(|held| held.owner == owner) {
            locks.remove(name);
            return Ok(true);
        }
        Ok(false)
    }

    fn renew(&self, name: &str, owner: &str, lease: Duration) -> Result<bool> {
        let mut locks = self.locks();
        match locks.get_mut(name) {
            Some(held) if held.owner == owner => {
                *held = LockRecord::new(owner, lease);
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    fn holder(&self, name: &str) -> Result<Option<LockRecord>> {
        Ok(self
            .locks()
            .get(name)
            .filter(|held| !held.is_expired())
            .cloned())
    }
}
