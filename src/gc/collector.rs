//! Per-type garbage collection cycle.
//!
//! One cycle for one object type:
//!
//! 1. Take the cluster lock `gc/<Type>` without waiting. If it is held, the
//!    cycle is skipped with [`CycleOutcome::LockUnavailable`].
//! 2. List decommissioned objects older than the retention marker.
//! 3. For each candidate: renew the lock lease, reload the candidate, check it
//!    is still decommissioned before the marker, ask the dependency checker,
//!    and remove it only if nothing references it. Index entries left behind
//!    by an object that is already gone are dropped.
//! 4. Release the lock, on every path.
//!
//! Per-candidate failures are logged and counted. A failure of the listing
//! itself, or losing the lock, aborts the cycle.

use super::retention::RetentionConfig;
use crate::coordinator::{ClusterLock, LockGuard, LockService};
use crate::deps::DependencyCheck;
use crate::models::{ObjectType, TimeToken};
use crate::storage::{InactiveObject, ObjectStore};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Default lease of a GC lock.
pub const DEFAULT_LOCK_LEASE: Duration = Duration::from_secs(600);

/// Returns the cluster lock name guarding GC of `object_type`.
#[must_use]
pub fn gc_lock_name(object_type: ObjectType) -> String {
    format!("gc/{object_type}")
}

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

#[inline]
fn usize_to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The cycle ran and deleted what it could.
    Completed,
    /// Another holder had the lock; nothing was examined.
    LockUnavailable,
    /// The cycle ran without deleting anything.
    DryRun,
}

impl CycleOutcome {
    /// Returns the outcome name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::LockUnavailable => "lock_unavailable",
            Self::DryRun => "dry_run",
        }
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one GC cycle.
#[derive(Debug, Clone, Serialize)]
pub struct GcCycleResult {
    /// Type collected.
    pub object_type: ObjectType,
    /// Candidates listed.
    pub found: usize,
    /// Candidates removed (or that would be removed in a dry run).
    pub deleted: usize,
    /// Candidates kept because something references them.
    pub retained: usize,
    /// Candidates skipped because they vanished, were reactivated or are
    /// newer than the marker. These do not count toward the batch limit.
    pub vanished: usize,
    /// Candidates skipped because of an error.
    pub errors: usize,
    /// How the cycle ended.
    pub outcome: CycleOutcome,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Whether deletions were suppressed.
    pub dry_run: bool,
    /// Whether the batch limit cut the listing short.
    pub batch_limit_reached: bool,
}

impl GcCycleResult {
    fn new(object_type: ObjectType, dry_run: bool) -> Self {
        Self {
            object_type,
            found: 0,
            deleted: 0,
            retained: 0,
            vanished: 0,
            errors: 0,
            outcome: if dry_run {
                CycleOutcome::DryRun
            } else {
                CycleOutcome::Completed
            },
            duration_ms: 0,
            dry_run,
            batch_limit_reached: false,
        }
    }

    /// Returns `true` if the cycle examined candidates.
    #[must_use]
    pub const fn ran(&self) -> bool {
        !matches!(self.outcome, CycleOutcome::LockUnavailable)
    }

    /// Returns a human-readable summary of the cycle.
    #[must_use]
    pub fn summary(&self) -> String {
        if !self.ran() {
            return format!(
                "{}: skipped, GC lock held elsewhere ({}ms)",
                self.object_type, self.duration_ms
            );
        }
        let action = if self.dry_run { "would delete" } else { "deleted" };
        let mut summary = format!(
            "{}: found={}, {action}={}, retained={}, vanished={}, errors={} in {}ms",
            self.object_type,
            self.found,
            self.deleted,
            self.retained,
            self.vanished,
            self.errors,
            self.duration_ms
        );
        if self.batch_limit_reached {
            summary.push_str(" (batch limit reached)");
        }
        summary
    }
}

enum Verdict {
    Deleted,
    Retained,
    Vanished,
}

/// Garbage collector for decommissioned objects.
///
/// One collector serves every type; cycles for different types are
/// independent and may run concurrently. Cycles for the same type are
/// serialized cluster-wide by the `gc/<Type>` lock.
#[derive(Clone)]
pub struct GarbageCollector {
    objects: Arc<dyn ObjectStore>,
    deps: Arc<dyn DependencyCheck>,
    locks: Arc<dyn LockService>,
    node_id: String,
    retention: RetentionConfig,
    lock_wait: Duration,
    lock_lease: Duration,
    dry_run: bool,
}

impl GarbageCollector {
    /// Creates a collector that takes locks as `node_id`.
    #[must_use]
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        deps: Arc<dyn DependencyCheck>,
        locks: Arc<dyn LockService>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            deps,
            locks,
            node_id: node_id.into(),
            retention: RetentionConfig::default(),
            lock_wait: Duration::ZERO,
            lock_lease: DEFAULT_LOCK_LEASE,
            dry_run: false,
        }
    }

    /// Sets the retention policy.
    #[must_use]
    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    /// Sets how long to wait for the lock. Zero tries once.
    #[must_use]
    pub const fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Sets the lock lease.
    #[must_use]
    pub const fn with_lock_lease(mut self, lease: Duration) -> Self {
        self.lock_lease = lease;
        self
    }

    /// Reports deletions without performing them.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Returns the retention policy.
    #[must_use]
    pub const fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    /// Runs one cycle for `object_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate listing fails, or
    /// [`Error::LockUnavailable`] if the lease was lost mid-cycle. The lock
    /// has been released by then.
    #[instrument(
        name = "reclaim.gc.run_cycle",
        skip(self),
        fields(
            component = "gc",
            operation = "run_cycle",
            object_type = %object_type,
            dry_run = self.dry_run
        )
    )]
    pub fn run_cycle(&self, object_type: ObjectType) -> Result<GcCycleResult> {
        let start = Instant::now();
        let mut result = GcCycleResult::new(object_type, self.dry_run);

        let lock = ClusterLock::new(
            Arc::clone(&self.locks),
            gc_lock_name(object_type),
            self.node_id.clone(),
            self.lock_lease,
        );
        let guard = match lock.try_lock(self.lock_wait) {
            Ok(guard) => guard,
            Err(e) => {
                if matches!(e, Error::LockUnavailable(_)) {
                    debug!(lock = %lock.name(), "GC lock held elsewhere, skipping cycle");
                } else {
                    warn!(
                        lock = %lock.name(),
                        error = %e,
                        "Cannot reach lock service, skipping cycle"
                    );
                }
                result.outcome = CycleOutcome::LockUnavailable;
                result.duration_ms = duration_to_millis(start.elapsed());
                metrics::counter!("gc_lock_unavailable_total", "type" => object_type.as_str())
                    .increment(1);
                Self::record_metrics(&result);
                return Ok(result);
            },
        };

        let scanned = self.collect(object_type, &guard, &mut result);
        drop(guard);
        result.duration_ms = duration_to_millis(start.elapsed());

        if let Err(e) = scanned {
            error!(
                error = %e,
                found = result.found,
                deleted = result.deleted,
                "GC cycle aborted"
            );
            metrics::counter!(
                "gc_cycles_total",
                "type" => object_type.as_str(),
                "outcome" => "aborted"
            )
            .increment(1);
            return Err(e);
        }

        Self::record_metrics(&result);
        info!(
            found = result.found,
            deleted = result.deleted,
            retained = result.retained,
            vanished = result.vanished,
            errors = result.errors,
            duration_ms = result.duration_ms,
            dry_run = result.dry_run,
            "GC cycle completed"
        );
        Ok(result)
    }

    fn collect(
        &self,
        object_type: ObjectType,
        guard: &LockGuard,
        result: &mut GcCycleResult,
    ) -> Result<()> {
        let marker = self.retention.marker(object_type);
        debug!(
            marker = marker.map(|m| m.to_string()),
            delay_mins = self.retention.effective_delay_mins(object_type),
            "Listing GC candidates"
        );

        let limit = self.retention.batch_limit;
        for candidate in self.objects.query_inactive_objects(object_type, marker)? {
            let examined = result.deleted + result.retained + result.errors;
            if limit > 0 && examined >= limit {
                result.batch_limit_reached = true;
                break;
            }
            let candidate = candidate?;
            guard.renew()?;
            result.found += 1;

            match self.process(object_type, &candidate, marker) {
                Ok(Verdict::Deleted) => result.deleted += 1,
                Ok(Verdict::Retained) => result.retained += 1,
                Ok(Verdict::Vanished) => result.vanished += 1,
                Err(e) => {
                    warn!(id = %candidate.id, error = %e, "Skipping GC candidate");
                    result.errors += 1;
                },
            }
        }
        Ok(())
    }

    fn process(
        &self,
        object_type: ObjectType,
        candidate: &InactiveObject,
        marker: Option<TimeToken>,
    ) -> Result<Verdict> {
        let id = &candidate.id;
        let Some(object) = self.objects.query_object(object_type, id)? else {
            debug!(id = %id, "Candidate vanished");
            if !self.dry_run {
                self.objects.remove_stale_inactive(object_type, candidate)?;
            }
            return Ok(Verdict::Vanished);
        };
        if !object.decommissioned_before(marker) {
            debug!(id = %id, "Candidate no longer eligible");
            return Ok(Verdict::Vanished);
        }

        if let Some(dependency) = self.deps.has_dependency(id, object_type, true)? {
            debug!(id = %id, %dependency, "Retaining referenced object");
            return Ok(Verdict::Retained);
        }

        if self.dry_run {
            info!(id = %id, "Would delete unreferenced object");
            return Ok(Verdict::Deleted);
        }
        if self.objects.remove_object(&object)? {
            info!(id = %id, "Deleted unreferenced object");
            Ok(Verdict::Deleted)
        } else {
            Ok(Verdict::Vanished)
        }
    }

    fn record_metrics(result: &GcCycleResult) {
        let object_type = result.object_type.as_str();
        metrics::counter!(
            "gc_cycles_total",
            "type" => object_type,
            "outcome" => result.outcome.as_str()
        )
        .increment(1);
        metrics::counter!("gc_objects_found_total", "type" => object_type)
            .increment(usize_to_u64(result.found));
        if !result.dry_run {
            metrics::counter!("gc_objects_deleted_total", "type" => object_type)
                .increment(usize_to_u64(result.deleted));
        }
        metrics::histogram!("gc_cycle_duration_ms", "type" => object_type)
            .record(u64_to_f64(result.duration_ms));
    }
}

impl fmt::Debug for GarbageCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GarbageCollector")
            .field("node_id", &self.node_id)
            .field("retention", &self.retention)
            .field("lock_wait", &self.lock_wait)
            .field("lock_lease", &self.lock_lease)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}
