//! Constraint construction from the type registry.

use super::constraint::{Constraint, ConstraintKind, DEFAULT_PAGE_SIZE, LabelMatch};
use crate::index::IndexKey;
use crate::models::{FieldDescriptor, ObjectId, ObjectType, TimeToken, TypeRegistry};
use crate::storage::ColumnStore;
use crate::{Error, Result};
use std::sync::Arc;

/// Builds constraints bound to one store and registry.
#[derive(Clone)]
pub struct ConstraintFactory {
    store: Arc<dyn ColumnStore>,
    registry: Arc<TypeRegistry>,
    page_size: usize,
}

impl ConstraintFactory {
    /// Creates a factory with the default page size.
    #[must_use]
    pub fn new(store: Arc<dyn ColumnStore>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            store,
            registry,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the page size used by every constraint built from now on.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Referrers of `referenced` through `field` of `referrer` objects.
    #[must_use]
    pub fn containment(
        &self,
        referenced: &ObjectId,
        referrer: ObjectType,
        field: &FieldDescriptor,
    ) -> Constraint {
        self.build(
            IndexKey::for_container(referenced),
            ConstraintKind::Containment {
                referrer,
                field: field.name.to_string(),
            },
        )
    }

    /// Objects of `object_type` in `container` whose label starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the type has no label index.
    pub fn label_prefix(
        &self,
        object_type: ObjectType,
        container: &ObjectId,
        prefix: &str,
    ) -> Result<Constraint> {
        self.label(object_type, container, LabelMatch::Prefix(prefix.to_string()))
    }

    /// Objects of `object_type` in `container` whose label equals `label`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the type has no label index.
    pub fn label_exact(
        &self,
        object_type: ObjectType,
        container: &ObjectId,
        label: &str,
    ) -> Result<Constraint> {
        self.label(object_type, container, LabelMatch::Exact(label.to_string()))
    }

    /// Decommissioned objects of `object_type`, optionally older than a marker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the type is not registered.
    pub fn decommissioned(
        &self,
        object_type: ObjectType,
        older_than: Option<TimeToken>,
    ) -> Result<Constraint> {
        let descriptor = self.registry.descriptor(object_type)?;
        Ok(self.build(
            IndexKey::for_type(descriptor),
            ConstraintKind::Decommissioned {
                object_type,
                older_than,
            },
        ))
    }

    fn label(
        &self,
        object_type: ObjectType,
        container: &ObjectId,
        matcher: LabelMatch,
    ) -> Result<Constraint> {
        let descriptor = self.registry.descriptor(object_type)?;
        if descriptor.label_container.is_none() {
            return Err(Error::Configuration(format!(
                "{object_type} objects are not label-indexed"
            )));
        }
        Ok(self.build(
            IndexKey::for_container(container),
            ConstraintKind::Label {
                object_type,
                matcher,
            },
        ))
    }

    fn build(&self, key: IndexKey, kind: ConstraintKind) -> Constraint {
        Constraint::new(Arc::clone(&self.store), key, kind).with_page_size(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryColumnStore;

    fn factory() -> ConstraintFactory {
        ConstraintFactory::new(
            Arc::new(MemoryColumnStore::new()),
            Arc::new(TypeRegistry::builtin()),
        )
        .with_page_size(7)
    }

    #[test]
    fn test_containment_targets_referrer_type() {
        let factory = factory();
        let project = ObjectId::generate(ObjectType::Project, "site1");
        let field = FieldDescriptor::relation("project", ObjectType::Project);
        let constraint = factory.containment(&project, ObjectType::Volume, &field);
        assert!(constraint.is_valid());
        assert_eq!(constraint.target_type(), ObjectType::Volume);
        assert_eq!(constraint.page_size(), 7);
        assert_eq!(constraint.key().as_str(), project.as_str());
    }

    #[test]
    fn test_label_requires_label_index() {
        let factory = factory();
        let tenant = ObjectId::generate(ObjectType::Tenant, "site1");
        assert!(matches!(
            factory.label_prefix(ObjectType::Tenant, &tenant, "a"),
            Err(Error::Configuration(_))
        ));
        assert!(factory.label_exact(ObjectType::Project, &tenant, "a").is_ok());
    }

    #[test]
    fn test_decommissioned_keyed_by_table() {
        let constraint = factory()
            .decommissioned(ObjectType::Tenant, None)
            .expect("registered");
        assert_eq!(constraint.key().as_str(), "TenantOrg");
    }
}
