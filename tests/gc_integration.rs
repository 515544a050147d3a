//! Integration tests for the garbage collector.
//!
//! Covers the end-to-end cycle over both column store backends:
//! - referenced candidates are retained, unreferenced ones deleted once
//! - concurrent cycles for one type are serialized by the cluster lock
//! - the lock is released when a cycle aborts
//! - long cycles renew their lease, and a lost lease aborts the cycle
//! - a failing dependency check skips only that candidate
//! - dry runs never delete

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use reclaim::coordinator::{LockService, MemoryLockService, StoreLockService};
use reclaim::deps::{
    DependencyCheck, DependencyDescriptor, DependencyTracker, LocalDependencyChecker,
};
use reclaim::gc::{CycleOutcome, GarbageCollector, RetentionConfig, gc_lock_name};
use reclaim::storage::{
    ColumnStore, InactiveObject, InactiveObjects, IndexedObjectStore, MemoryColumnStore,
    ObjectStore, SqliteColumnStore,
};
use reclaim::{Error, ObjectId, ObjectType, PersistedObject, Result, TimeToken, TypeRegistry};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use test_case::test_case;

// ============================================================================
// Helpers
// ============================================================================

#[derive(Clone, Copy, Debug)]
enum Backend {
    Memory,
    Sqlite,
}

struct Fixture {
    objects: Arc<IndexedObjectStore>,
    locks: Arc<dyn LockService>,
    registry: Arc<TypeRegistry>,
    _dir: Option<TempDir>,
}

impl Fixture {
    fn new(backend: Backend) -> Self {
        let (store, dir): (Arc<dyn ColumnStore>, _) = match backend {
            Backend::Memory => (Arc::new(MemoryColumnStore::new()), None),
            Backend::Sqlite => {
                let dir = TempDir::new().expect("temp dir");
                let store = SqliteColumnStore::new(dir.path().join("gc.db")).expect("sqlite");
                (Arc::new(store), Some(dir))
            },
        };
        let registry = Arc::new(TypeRegistry::builtin());
        let objects = Arc::new(
            IndexedObjectStore::new(Arc::clone(&store), Arc::clone(&registry)).with_page_size(2),
        );
        Self {
            objects,
            locks: Arc::new(StoreLockService::new(store)),
            registry,
            _dir: dir,
        }
    }

    fn deps(&self) -> Arc<dyn DependencyCheck> {
        Arc::new(LocalDependencyChecker::new(
            Arc::clone(&self.objects) as Arc<dyn ObjectStore>,
            self.objects.constraints().clone(),
            Arc::new(DependencyTracker::new(&self.registry)),
        ))
    }

    fn collector(&self, node: &str) -> GarbageCollector {
        self.collector_with(node, self.deps())
    }

    fn collector_with(&self, node: &str, deps: Arc<dyn DependencyCheck>) -> GarbageCollector {
        GarbageCollector::new(
            Arc::clone(&self.objects) as Arc<dyn ObjectStore>,
            deps,
            Arc::clone(&self.locks),
            node,
        )
        .with_retention(RetentionConfig::new().with_delay_mins(0))
    }

    fn pool(&self, label: &str, inactive: bool) -> PersistedObject {
        let mut pool = PersistedObject::new(
            ObjectType::StoragePool,
            ObjectId::generate(ObjectType::StoragePool, "site1"),
            label,
        );
        if inactive {
            pool.mark_inactive();
        }
        self.objects.persist_object(&pool).expect("persist pool");
        pool
    }

    fn volume_on(&self, pool: &PersistedObject, inactive: bool) -> PersistedObject {
        let mut volume = PersistedObject::new(
            ObjectType::Volume,
            ObjectId::generate(ObjectType::Volume, "site1"),
            "vol",
        )
        .with_relation("pool", pool.id.clone());
        if inactive {
            volume.mark_inactive();
        }
        self.objects.persist_object(&volume).expect("persist volume");
        volume
    }

    fn exists(&self, object: &PersistedObject) -> bool {
        self.objects
            .query_object(object.object_type, &object.id)
            .expect("query")
            .is_some()
    }
}

// ============================================================================
// Cycle semantics
// ============================================================================

#[test_case(Backend::Memory ; "memory backend")]
#[test_case(Backend::Sqlite ; "sqlite backend")]
fn test_referenced_candidate_is_retained(backend: Backend) {
    let fx = Fixture::new(backend);
    for label in ["a", "b", "c"] {
        fx.pool(label, false);
    }
    let d1 = fx.pool("d1", true);
    let d2 = fx.pool("d2", true);
    fx.volume_on(&d1, false);

    let result = fx
        .collector("node-a")
        .run_cycle(ObjectType::StoragePool)
        .expect("cycle");

    assert_eq!(result.outcome, CycleOutcome::Completed);
    assert_eq!(result.found, 2);
    assert_eq!(result.deleted, 1);
    assert_eq!(result.retained, 1);
    assert!(result.summary().contains("found=2"));
    assert!(fx.exists(&d1));
    assert!(!fx.exists(&d2));
}

#[test_case(Backend::Memory ; "memory backend")]
#[test_case(Backend::Sqlite ; "sqlite backend")]
fn test_inactive_referrer_does_not_block(backend: Backend) {
    let fx = Fixture::new(backend);
    let pool = fx.pool("old", true);
    fx.volume_on(&pool, true);

    let result = fx
        .collector("node-a")
        .run_cycle(ObjectType::StoragePool)
        .expect("cycle");

    assert_eq!((result.found, result.deleted), (1, 1));
    assert!(!fx.exists(&pool));
}

#[test]
fn test_unreferenced_candidates_deleted_exactly_once() {
    let fx = Fixture::new(Backend::Memory);
    let pools: Vec<_> = (0..5).map(|i| fx.pool(&format!("p{i}"), true)).collect();
    let collector = fx.collector("node-a");

    let first = collector.run_cycle(ObjectType::StoragePool).expect("cycle");
    assert_eq!((first.found, first.deleted), (5, 5));
    assert!(pools.iter().all(|p| !fx.exists(p)));

    let second = collector.run_cycle(ObjectType::StoragePool).expect("cycle");
    assert_eq!((second.found, second.deleted), (0, 0));
}

#[test]
fn test_retention_delay_protects_recent_candidates() {
    let fx = Fixture::new(Backend::Memory);
    let pool = fx.pool("recent", true);
    let collector = fx
        .collector("node-a")
        .with_retention(RetentionConfig::new().with_delay_mins(60));

    let result = collector.run_cycle(ObjectType::StoragePool).expect("cycle");
    assert_eq!(result.found, 0);
    assert!(fx.exists(&pool));
}

#[test]
fn test_dry_run_reports_without_deleting() {
    let fx = Fixture::new(Backend::Memory);
    let pool = fx.pool("gone", true);
    let result = fx
        .collector("node-a")
        .with_dry_run(true)
        .run_cycle(ObjectType::StoragePool)
        .expect("cycle");

    assert_eq!(result.outcome, CycleOutcome::DryRun);
    assert_eq!(result.deleted, 1);
    assert!(result.dry_run);
    assert!(fx.exists(&pool));
}

// ============================================================================
// Cluster lock
// ============================================================================

#[test]
fn test_held_lock_skips_cycle() {
    let fx = Fixture::new(Backend::Memory);
    let pool = fx.pool("gone", true);
    let name = gc_lock_name(ObjectType::StoragePool);
    assert!(
        fx.locks
            .try_acquire(&name, "node-b", Duration::from_secs(60))
            .expect("acquire")
    );

    let result = fx
        .collector("node-a")
        .run_cycle(ObjectType::StoragePool)
        .expect("cycle");

    assert_eq!(result.outcome, CycleOutcome::LockUnavailable);
    assert!(!result.ran());
    assert_eq!(result.deleted, 0);
    assert!(fx.exists(&pool));
}

#[test]
fn test_concurrent_cycles_delete_each_candidate_once() {
    const WORKERS: usize = 4;
    let fx = Fixture::new(Backend::Memory);
    for i in 0..6 {
        fx.pool(&format!("p{i}"), true);
    }

    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let collector = fx.collector(&format!("node-{i}"));
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                collector.run_cycle(ObjectType::StoragePool).expect("cycle")
            })
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("join"))
        .collect();

    let deleted: usize = results.iter().map(|r| r.deleted).sum();
    assert_eq!(deleted, 6);
    for result in &results {
        if result.outcome == CycleOutcome::LockUnavailable {
            assert_eq!(result.deleted, 0);
        }
    }
    assert!(results.iter().any(|r| r.outcome == CycleOutcome::Completed));
}

/// Dependency checker that sleeps before delegating.
struct SlowChecker {
    inner: Arc<dyn DependencyCheck>,
    delay: Duration,
}

impl DependencyCheck for SlowChecker {
    fn has_dependency(
        &self,
        id: &ObjectId,
        object_type: ObjectType,
        only_active: bool,
    ) -> Result<Option<DependencyDescriptor>> {
        thread::sleep(self.delay);
        self.inner.has_dependency(id, object_type, only_active)
    }
}

#[test]
fn test_long_cycle_keeps_lock_past_lease() {
    let fx = Fixture::new(Backend::Memory);
    let pools: Vec<_> = (0..5).map(|i| fx.pool(&format!("p{i}"), true)).collect();
    let slow = Arc::new(SlowChecker {
        inner: fx.deps(),
        delay: Duration::from_millis(100),
    });
    let collector = fx
        .collector_with("node-a", slow)
        .with_lock_lease(Duration::from_millis(300));

    let worker = thread::spawn(move || collector.run_cycle(ObjectType::StoragePool));
    thread::sleep(Duration::from_millis(450));
    let contender = fx
        .collector("node-b")
        .run_cycle(ObjectType::StoragePool)
        .expect("cycle");
    assert_eq!(contender.outcome, CycleOutcome::LockUnavailable);

    let result = worker.join().expect("join").expect("cycle");
    assert_eq!(result.outcome, CycleOutcome::Completed);
    assert_eq!(result.deleted, 5);
    assert!(pools.iter().all(|p| !fx.exists(p)));
}

#[test]
fn test_lost_lease_aborts_cycle() {
    let fx = Fixture::new(Backend::Memory);
    for i in 0..3 {
        fx.pool(&format!("p{i}"), true);
    }
    let slow = Arc::new(SlowChecker {
        inner: fx.deps(),
        delay: Duration::from_millis(200),
    });
    let collector = fx
        .collector_with("node-a", slow)
        .with_lock_lease(Duration::from_millis(50));

    let worker = thread::spawn(move || collector.run_cycle(ObjectType::StoragePool));
    thread::sleep(Duration::from_millis(100));
    let name = gc_lock_name(ObjectType::StoragePool);
    assert!(
        fx.locks
            .try_acquire(&name, "node-b", Duration::from_secs(60))
            .expect("take over expired lease")
    );

    let err = worker
        .join()
        .expect("join")
        .expect_err("lost lease aborts the cycle");
    assert!(matches!(err, Error::LockUnavailable(_)));
    assert_eq!(
        fx.locks.holder(&name).expect("holder").map(|r| r.owner),
        Some("node-b".to_string())
    );
}

// ============================================================================
// Failure isolation
// ============================================================================

/// Dependency checker that fails for one object and delegates otherwise.
struct FailsFor {
    inner: Arc<dyn DependencyCheck>,
    failing: ObjectId,
}

impl DependencyCheck for FailsFor {
    fn has_dependency(
        &self,
        id: &ObjectId,
        object_type: ObjectType,
        only_active: bool,
    ) -> Result<Option<DependencyDescriptor>> {
        if *id == self.failing {
            return Err(Error::QueryFailed {
                operation: "scan_page".to_string(),
                cause: "store offline".to_string(),
            });
        }
        self.inner.has_dependency(id, object_type, only_active)
    }
}

#[test_case(Backend::Memory ; "memory backend")]
#[test_case(Backend::Sqlite ; "sqlite backend")]
fn test_failed_check_skips_only_that_candidate(backend: Backend) {
    let fx = Fixture::new(backend);
    let first = fx.pool("a", true);
    let failing = fx.pool("b", true);
    let last = fx.pool("c", true);
    let deps = Arc::new(FailsFor {
        inner: fx.deps(),
        failing: failing.id.clone(),
    });

    let result = fx
        .collector_with("node-a", deps)
        .run_cycle(ObjectType::StoragePool)
        .expect("cycle");

    assert_eq!(result.outcome, CycleOutcome::Completed);
    assert_eq!(result.found, 3);
    assert_eq!(result.errors, 1);
    assert_eq!(result.deleted, 2);
    assert!(result.summary().contains("errors=1"));
    assert!(fx.exists(&failing));
    assert!(!fx.exists(&first));
    assert!(!fx.exists(&last));
}

/// Object store whose candidate listing fails on the first page.
struct FailingListing {
    inner: Arc<IndexedObjectStore>,
}

impl ObjectStore for FailingListing {
    fn query_object(
        &self,
        object_type: ObjectType,
        id: &ObjectId,
    ) -> Result<Option<PersistedObject>> {
        self.inner.query_object(object_type, id)
    }

    fn query_inactive_objects(
        &self,
        _object_type: ObjectType,
        _older_than: Option<TimeToken>,
    ) -> Result<InactiveObjects<'_>> {
        Ok(Box::new(std::iter::once(Err(Error::QueryFailed {
            operation: "scan".to_string(),
            cause: "store offline".to_string(),
        }))))
    }

    fn persist_object(&self, object: &PersistedObject) -> Result<()> {
        self.inner.persist_object(object)
    }

    fn remove_object(&self, object: &PersistedObject) -> Result<bool> {
        self.inner.remove_object(object)
    }

    fn remove_stale_inactive(
        &self,
        object_type: ObjectType,
        entry: &InactiveObject,
    ) -> Result<bool> {
        self.inner.remove_stale_inactive(object_type, entry)
    }
}

#[test]
fn test_aborted_cycle_releases_lock() {
    let fx = Fixture::new(Backend::Memory);
    let locks: Arc<dyn LockService> = Arc::new(MemoryLockService::new());
    let failing = Arc::new(FailingListing {
        inner: Arc::clone(&fx.objects),
    });
    let collector = GarbageCollector::new(failing, fx.deps(), Arc::clone(&locks), "node-a");

    let err = collector
        .run_cycle(ObjectType::StoragePool)
        .expect_err("listing failure aborts the cycle");
    assert!(matches!(err, Error::QueryFailed { .. }));
    assert!(
        locks
            .holder(&gc_lock_name(ObjectType::StoragePool))
            .expect("holder")
            .is_none()
    );
}
