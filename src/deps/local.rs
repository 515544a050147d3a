//! Local relation-index dependency check.

use super::{DependencyCheck, DependencyDescriptor, DependencyTracker};
use crate::Result;
use crate::models::{ObjectId, ObjectType};
use crate::query::ConstraintFactory;
use crate::storage::ObjectStore;
use std::sync::Arc;
use tracing::debug;

/// Looks for referrers in this site's relation index.
#[derive(Clone)]
pub struct LocalDependencyChecker {
    objects: Arc<dyn ObjectStore>,
    constraints: ConstraintFactory,
    tracker: Arc<DependencyTracker>,
}

impl LocalDependencyChecker {
    /// Creates a checker.
    #[must_use]
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        constraints: ConstraintFactory,
        tracker: Arc<DependencyTracker>,
    ) -> Self {
        Self {
            objects,
            constraints,
            tracker,
        }
    }
}

impl DependencyCheck for LocalDependencyChecker {
    fn has_dependency(
        &self,
        id: &ObjectId,
        object_type: ObjectType,
        only_active: bool,
    ) -> Result<Option<DependencyDescriptor>> {
        for referrer in self.tracker.referrers(object_type) {
            let constraint = self
                .constraints
                .containment(id, referrer.object_type, &referrer.field);

            for hit in constraint.iter()? {
                let hit = hit?;
                if only_active {
                    // The index may lag the rows; only a live holder of the id counts.
                    let live = self
                        .objects
                        .query_object(referrer.object_type, &hit.id)?
                        .is_some_and(|r| {
                            !r.inactive && r.relation(referrer.field.name).contains(id)
                        });
                    if !live {
                        debug!(referrer = %hit.id, target = %id, "Ignoring stale relation entry");
                        continue;
                    }
                }
                return Ok(Some(DependencyDescriptor::Local {
                    referrer: referrer.object_type,
                    field: referrer.field.name.to_string(),
                    id: hit.id,
                }));
            }
        }
        Ok(None)
    }
}
