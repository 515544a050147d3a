//! Garbage collection of decommissioned objects.
//!
//! Objects are never physically removed by application code: they are
//! marked inactive ("decommissioned"). The collector reclaims them once they
//! are past the retention delay and nothing references them, locally or on a
//! remote site.
//!
//! # Example
//!
//! ```rust,ignore
//! use reclaim::gc::{GarbageCollector, RetentionConfig};
//! use reclaim::models::ObjectType;
//!
//! let gc = GarbageCollector::new(objects, deps, locks, "node-a")
//!     .with_retention(RetentionConfig::from_env())
//!     .with_dry_run(true);
//!
//! // Dry run to see what would be reclaimed
//! let result = gc.run_cycle(ObjectType::Volume)?;
//! println!("{}", result.summary());
//! ```
//!
//! # Scheduling
//!
//! [`GcScheduler`] runs one cycle per type on a fixed interval. Cycles for the
//! same type on different nodes are serialized by the cluster lock
//! `gc/<Type>`; a node that finds it held skips that tick.

mod collector;
mod retention;
mod scheduler;

pub use collector::{
    CycleOutcome, DEFAULT_LOCK_LEASE, GarbageCollector, GcCycleResult, gc_lock_name,
};
pub use retention::{DEFAULT_RETENTION_DELAY_MINS, RETENTION_DELAY_ENV, RetentionConfig};
pub use scheduler::{DEFAULT_INITIAL_DELAY, DEFAULT_INTERVAL, GcScheduler};
