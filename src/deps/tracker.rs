//! Reverse relation map derived from the type registry.

use crate::models::{FieldDescriptor, ObjectType, TypeRegistry};
use std::collections::HashMap;

/// A `(type, field)` pair that can hold ids of another type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Referrer {
    /// Referencing type.
    pub object_type: ObjectType,
    /// Relation field on the referencing type.
    pub field: FieldDescriptor,
}

/// For every type, the relation fields that can point at it.
///
/// Built once from the registry and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct DependencyTracker {
    referrers: HashMap<ObjectType, Vec<Referrer>>,
}

impl DependencyTracker {
    /// Derives the tracker from `registry`.
    #[must_use]
    pub fn new(registry: &TypeRegistry) -> Self {
        let mut referrers: HashMap<ObjectType, Vec<Referrer>> = HashMap::new();
        for object_type in registry.types() {
            let Ok(descriptor) = registry.descriptor(object_type) else {
                continue;
            };
            for field in &descriptor.relations {
                referrers.entry(field.references).or_default().push(Referrer {
                    object_type,
                    field: *field,
                });
            }
        }
        Self { referrers }
    }

    /// Returns the referrers of `object_type`, in registry order.
    #[must_use]
    pub fn referrers(&self, object_type: ObjectType) -> &[Referrer] {
        self.referrers.get(&object_type).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if nothing can reference `object_type`.
    #[must_use]
    pub fn is_leaf(&self, object_type: ObjectType) -> bool {
        self.referrers(object_type).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_referrers() {
        let tracker = DependencyTracker::new(&TypeRegistry::builtin());
        let referrers: Vec<(ObjectType, &str)> = tracker
            .referrers(ObjectType::Project)
            .iter()
            .map(|r| (r.object_type, r.field.name))
            .collect();
        assert_eq!(
            referrers,
            vec![
                (ObjectType::Volume, "project"),
                (ObjectType::BlockSnapshot, "project"),
                (ObjectType::ExportGroup, "project"),
            ]
        );
    }

    #[test]
    fn test_leaf_types() {
        let tracker = DependencyTracker::new(&TypeRegistry::builtin());
        assert!(tracker.is_leaf(ObjectType::ExportGroup));
        assert!(tracker.is_leaf(ObjectType::BlockSnapshot));
        assert!(!tracker.is_leaf(ObjectType::Volume));
        assert!(!tracker.is_leaf(ObjectType::StorageSystem));
    }
}
