//! Service wiring.
//!
//! [`ServiceContainer`] builds every component from a [`ReclaimConfig`] and
//! passes shared pieces down explicitly:
//!
//! ```text
//! ColumnStore (memory | sqlite) -> ResilientColumnStore
//!   ├── IndexedObjectStore ── ConstraintFactory
//!   ├── StoreLockService
//!   └── LocalDependencyChecker -> GeoDependencyChecker (HttpGeoClient, StaticSiteDirectory)
//!         └── GarbageCollector
//! ```

mod decommission;

pub use decommission::DecommissionService;

use crate::config::{ReclaimConfig, StoreBackend};
use crate::coordinator::{LockService, StoreLockService};
use crate::deps::{
    DependencyCheck, DependencyTracker, GeoDependencyChecker, HttpGeoClient,
    LocalDependencyChecker, StaticSiteDirectory,
};
use crate::gc::{GarbageCollector, GcScheduler};
use crate::models::TypeRegistry;
use crate::query::ConstraintFactory;
use crate::storage::{
    ColumnStore, IndexedObjectStore, MemoryColumnStore, ObjectStore, ResilienceConfig,
    ResilientColumnStore, SqliteColumnStore,
};
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// All services, wired once per process.
#[derive(Clone)]
pub struct ServiceContainer {
    config: ReclaimConfig,
    registry: Arc<TypeRegistry>,
    objects: Arc<IndexedObjectStore>,
    locks: Arc<dyn LockService>,
    deps: Arc<dyn DependencyCheck>,
    collector: GarbageCollector,
}

impl ServiceContainer {
    /// Builds every service from `config` with the built-in type registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store cannot
    /// be opened.
    pub fn from_config(config: &ReclaimConfig) -> Result<Self> {
        Self::with_registry(config, Arc::new(TypeRegistry::builtin()))
    }

    /// Builds every service from `config` and an explicit registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store cannot
    /// be opened.
    pub fn with_registry(config: &ReclaimConfig, registry: Arc<TypeRegistry>) -> Result<Self> {
        config.validate()?;
        let resilience = ResilienceConfig::from_env();

        let store: Arc<dyn ColumnStore> = match config.store.backend {
            StoreBackend::Memory => Arc::new(ResilientColumnStore::new(
                MemoryColumnStore::new(),
                &resilience,
            )),
            StoreBackend::Sqlite => Arc::new(ResilientColumnStore::new(
                SqliteColumnStore::new(&config.store.path)?,
                &resilience,
            )),
        };
        Ok(Self::with_store(config, registry, store))
    }

    /// Builds every service over an already opened column store.
    #[must_use]
    pub fn with_store(
        config: &ReclaimConfig,
        registry: Arc<TypeRegistry>,
        store: Arc<dyn ColumnStore>,
    ) -> Self {
        let objects = Arc::new(
            IndexedObjectStore::new(Arc::clone(&store), Arc::clone(&registry))
                .with_page_size(config.query.page_size),
        );
        let locks: Arc<dyn LockService> = Arc::new(StoreLockService::new(Arc::clone(&store)));

        let local = Arc::new(LocalDependencyChecker::new(
            Arc::clone(&objects) as Arc<dyn ObjectStore>,
            objects.constraints().clone(),
            Arc::new(DependencyTracker::new(&registry)),
        ));
        let client = HttpGeoClient::new(config.geo.rpc_timeout())
            .with_breaker_config(ResilienceConfig::from_env());
        let deps: Arc<dyn DependencyCheck> = Arc::new(GeoDependencyChecker::new(
            local,
            Arc::clone(&registry),
            Arc::new(StaticSiteDirectory::new(config.geo.sites.clone())),
            Arc::new(client),
            config.geo.local_site.clone(),
        ));

        let collector = GarbageCollector::new(
            Arc::clone(&objects) as Arc<dyn ObjectStore>,
            Arc::clone(&deps),
            Arc::clone(&locks),
            config.node_id.clone(),
        )
        .with_retention(config.gc.retention.clone())
        .with_lock_wait(config.gc.lock_wait())
        .with_lock_lease(config.gc.lock_lease())
        .with_dry_run(config.gc.dry_run);

        info!(
            backend = store.backend_name(),
            node_id = %config.node_id,
            local_site = %config.geo.local_site,
            sites = config.geo.sites.len(),
            "Services initialized"
        );

        Self {
            config: config.clone(),
            registry,
            objects,
            locks,
            deps,
            collector,
        }
    }

    /// Returns the configuration the services were built from.
    #[must_use]
    pub const fn config(&self) -> &ReclaimConfig {
        &self.config
    }

    /// Returns the type registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Returns the object store.
    #[must_use]
    pub fn objects(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.objects) as Arc<dyn ObjectStore>
    }

    /// Returns the constraint factory.
    #[must_use]
    pub fn constraints(&self) -> &ConstraintFactory {
        self.objects.constraints()
    }

    /// Returns the lock service.
    #[must_use]
    pub fn locks(&self) -> Arc<dyn LockService> {
        Arc::clone(&self.locks)
    }

    /// Returns the geo-aware dependency checker.
    #[must_use]
    pub fn dependency_checker(&self) -> Arc<dyn DependencyCheck> {
        Arc::clone(&self.deps)
    }

    /// Returns the garbage collector.
    #[must_use]
    pub const fn garbage_collector(&self) -> &GarbageCollector {
        &self.collector
    }

    /// Returns a stopped scheduler using the configured timing.
    #[must_use]
    pub fn gc_scheduler(&self) -> GcScheduler {
        GcScheduler::new(self.collector.clone())
            .with_initial_delay(self.config.gc.initial_delay())
            .with_interval(self.config.gc.interval())
    }

    /// Returns the decommission service.
    #[must_use]
    pub fn decommission(&self) -> DecommissionService {
        DecommissionService::new(self.objects())
    }
}
