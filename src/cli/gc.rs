//! Garbage collection CLI command.

// Allow print_stdout in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]

use crate::gc::GcCycleResult;
use crate::models::ObjectType;
use crate::services::ServiceContainer;
use crate::{Error, Result};

/// Runs one cycle per type now.
///
/// Failed cycles are logged and counted; the others still run.
///
/// # Errors
///
/// Returns an error if any cycle failed.
pub fn execute(
    container: &ServiceContainer,
    types: &[ObjectType],
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let (results, failed) = run_cycles(container, types, dry_run);

    if json {
        let rendered = serde_json::to_string_pretty(&results).map_err(|e| {
            Error::OperationFailed {
                operation: "render_gc_results".to_string(),
                cause: e.to_string(),
            }
        })?;
        println!("{rendered}");
    } else {
        if dry_run {
            println!("Dry-run mode: nothing will be deleted\n");
        }
        for result in &results {
            println!("{}", result.summary());
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::OperationFailed {
            operation: "gc".to_string(),
            cause: format!("{} cycle(s) failed: {}", failed.len(), failed.join(", ")),
        })
    }
}

/// Runs the cycles and splits them into results and failed type names.
pub fn run_cycles(
    container: &ServiceContainer,
    types: &[ObjectType],
    dry_run: bool,
) -> (Vec<GcCycleResult>, Vec<String>) {
    let collector = if dry_run {
        container.garbage_collector().clone().with_dry_run(true)
    } else {
        container.garbage_collector().clone()
    };

    let mut results = Vec::with_capacity(types.len());
    let mut failed = Vec::new();
    for object_type in types {
        match collector.run_cycle(*object_type) {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::error!(object_type = %object_type, error = %e, "GC cycle failed");
                failed.push(object_type.to_string());
            },
        }
    }
    (results, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReclaimConfig, StoreBackend};
    use crate::gc::{CycleOutcome, RetentionConfig};
    use crate::models::{ObjectId, PersistedObject};

    #[test]
    fn test_dry_run_keeps_candidates() {
        let config = ReclaimConfig::default()
            .with_store_backend(StoreBackend::Memory)
            .with_retention(RetentionConfig::new().with_delay_mins(0));
        let container = ServiceContainer::from_config(&config).expect("container");
        let mut pool = PersistedObject::new(
            ObjectType::StoragePool,
            ObjectId::generate(ObjectType::StoragePool, "site1"),
            "pool",
        );
        pool.mark_inactive();
        container.objects().persist_object(&pool).expect("persist");

        let (results, failed) = run_cycles(&container, &[ObjectType::StoragePool], true);
        assert!(failed.is_empty());
        assert_eq!(results[0].outcome, CycleOutcome::DryRun);
        assert_eq!(results[0].deleted, 1);
        assert!(
            container
                .objects()
                .query_object(ObjectType::StoragePool, &pool.id)
                .expect("query")
                .is_some()
        );
    }
}
