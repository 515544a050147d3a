//! Cluster-wide named locks.
//!
//! A lock is a lease: the holder's id plus an expiry time. Acquisition is a
//! compare-and-swap on the lock record, an expired lease may be taken over,
//! and a lock is never re-entered by the owner that already holds it. Long
//! critical sections call [`LockGuard::renew`] to push the expiry forward.
//!
//! ```rust,ignore
//! let lock = ClusterLock::new(service, "gc/Volume", node_id, lease);
//! let guard = lock.try_lock(Duration::ZERO)?; // Err(LockUnavailable) if busy
//! for item in work {
//!     guard.renew()?; // Err(LockUnavailable) once another node took over
//!     // ...
//! }
//! drop(guard); // released here, even on early return
//! ```

mod memory;
mod store;

pub use memory::MemoryLockService;
pub use store::{GLOBAL_LOCK_TABLE, StoreLockService};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long to sleep between attempts while waiting for a lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Lock mode stored with each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// One holder cluster-wide.
    Exclusive,
}

/// Persisted state of a held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Holder id (node id).
    pub owner: String,
    /// Lock mode.
    pub mode: LockMode,
    /// Lease expiry, Unix milliseconds.
    pub expires_at_ms: u64,
}

impl LockRecord {
    /// Creates a record leased to `owner` for `lease` from now.
    #[must_use]
    pub fn new(owner: &str, lease: Duration) -> Self {
        let lease_ms = u64::try_from(lease.as_millis()).unwrap_or(u64::MAX);
        Self {
            owner: owner.to_string(),
            mode: LockMode::Exclusive,
            expires_at_ms: crate::current_timestamp_millis().saturating_add(lease_ms),
        }
    }

    /// Returns `true` once the lease has run out.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        crate::current_timestamp_millis() >= self.expires_at_ms
    }
}

/// Coordinator lock interface.
pub trait LockService: Send + Sync {
    /// Tries once to take `name` for `owner`. Returns `false` if it is held,
    /// including when `owner` itself holds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be reached.
    fn try_acquire(&self, name: &str, owner: &str, lease: Duration) -> Result<bool>;

    /// Releases `name` if `owner` holds it. Returns `false` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be reached.
    fn release(&self, name: &str, owner: &str) -> Result<bool>;

    /// Extends `owner`'s lease on `name` to `lease` from now. Returns `false`
    /// if `owner` no longer holds the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be reached.
    fn renew(&self, name: &str, owner: &str, lease: Duration) -> Result<bool>;

    /// Returns the current live holder of `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be reached.
    fn holder(&self, name: &str) -> Result<Option<LockRecord>>;
}

/// A named lock handle bound to one owner.
#[derive(Clone)]
pub struct ClusterLock {
    service: Arc<dyn LockService>,
    name: String,
    owner: String,
    lease: Duration,
}

impl ClusterLock {
    /// Creates a handle; nothing is acquired yet.
    #[must_use]
    pub fn new(
        service: Arc<dyn LockService>,
        name: impl Into<String>,
        owner: impl Into<String>,
        lease: Duration,
    ) -> Self {
        Self {
            service,
            name: name.into(),
            owner: owner.into(),
            lease,
        }
    }

    /// Returns the lock name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires the lock, waiting at most `wait`. A zero wait tries once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockUnavailable`] if the lock is still held when the
    /// wait runs out, or the coordinator's error if it cannot be reached.
    pub fn try_lock(&self, wait: Duration) -> Result<LockGuard> {
        let deadline = Instant::now() + wait;
        loop {
            if self.service.try_acquire(&self.name, &self.owner, self.lease)? {
                debug!(lock = %self.name, owner = %self.owner, "Acquired lock");
                return Ok(LockGuard {
                    service: Arc::clone(&self.service),
                    name: self.name.clone(),
                    owner: self.owner.clone(),
                    lease: self.lease,
                    released: false,
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::LockUnavailable(self.name.clone()));
            }
            std::thread::sleep(RETRY_INTERVAL.min(deadline - now));
        }
    }
}

impl fmt::Debug for ClusterLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterLock")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

/// A held lock. Released on [`LockGuard::release`] or when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    service: Arc<dyn LockService>,
    name: String,
    owner: String,
    lease: Duration,
    released: bool,
}

impl LockGuard {
    /// Returns the lock name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extends the lease by the lock's full lease length from now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockUnavailable`] if the lease ran out and another
    /// owner took the lock, or the coordinator's error if it cannot be reached.
    pub fn renew(&self) -> Result<()> {
        if self.service.renew(&self.name, &self.owner, self.lease)? {
            debug!(lock = %self.name, "Renewed lock");
            return Ok(());
        }
        warn!(lock = %self.name, owner = %self.owner, "Lock lost before renewal");
        Err(Error::LockUnavailable(self.name.clone()))
    }

    /// Releases the lock now.
    ///
    /// # Errors
    ///
    /// Returns the coordinator's error; the lease then expires on its own.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.release_inner()
    }

    fn release_inner(&self) -> Result<()> {
        if self.service.release(&self.name, &self.owner)? {
            debug!(lock = %self.name, "Released lock");
        } else {
            warn!(lock = %self.name, owner = %self.owner, "Lock was no longer held at release");
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.release_inner() {
            warn!(lock = %self.name, error = %e, "Failed to release lock; lease will expire");
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
