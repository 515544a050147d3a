//! Object store over a column store.
//!
//! Each object lives in its type's table as one JSON column under its id.
//! Writes keep three index tables in step with the row:
//!
//! - relation index: one column per `(field, target)` under the target's row
//! - label index: one column under each label-container row
//! - decommissioned index: one column under the type's row once inactive
//!
//! Removing an object deletes the entries it owns, then the row. Relation
//! entries pointing *at* the removed object belong to the referrers and are
//! left in place; readers re-load the referrer and tolerate stale edges.

use super::traits::{ColumnStore, InactiveObject, InactiveObjects, ObjectStore};
use crate::index::{
    self, DECOMMISSIONED_INDEX, INACTIVE_DISCRIMINATOR, LABEL_INDEX, RELATION_INDEX,
};
use crate::models::{
    ObjectId, ObjectType, PersistedObject, TimeToken, TypeDescriptor, TypeRegistry,
};
use crate::query::ConstraintFactory;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Column holding the serialized object inside its row.
const OBJECT_COLUMN: &[u8] = b"object";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IndexEntry {
    table: &'static str,
    row: Vec<u8>,
    name: Vec<u8>,
}

/// [`ObjectStore`] that maintains the secondary indexes itself.
#[derive(Clone)]
pub struct IndexedObjectStore {
    store: Arc<dyn ColumnStore>,
    registry: Arc<TypeRegistry>,
    constraints: ConstraintFactory,
}

impl IndexedObjectStore {
    /// Creates an object store over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ColumnStore>, registry: Arc<TypeRegistry>) -> Self {
        let constraints = ConstraintFactory::new(Arc::clone(&store), Arc::clone(&registry));
        Self {
            store,
            registry,
            constraints,
        }
    }

    /// Sets the page size used by index scans.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.constraints = self.constraints.with_page_size(page_size);
        self
    }

    /// Returns the constraint factory bound to this store.
    #[must_use]
    pub const fn constraints(&self) -> &ConstraintFactory {
        &self.constraints
    }

    /// Returns the underlying column store.
    #[must_use]
    pub const fn column_store(&self) -> &Arc<dyn ColumnStore> {
        &self.store
    }

    /// Returns the type registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn load(&self, descriptor: &TypeDescriptor, id: &ObjectId) -> Result<Option<PersistedObject>> {
        let Some(bytes) = self
            .store
            .get(descriptor.table, id.as_str().as_bytes(), OBJECT_COLUMN)?
        else {
            return Ok(None);
        };
        let object: PersistedObject = serde_json::from_slice(&bytes)
            .map_err(|e| Error::DataIntegrity(format!("object row {id} is not valid: {e}")))?;
        if object.object_type != descriptor.object_type || object.id != *id {
            return Err(Error::DataIntegrity(format!(
                "row {id} in {} holds {} {}",
                descriptor.table, object.object_type, object.id
            )));
        }
        Ok(Some(object))
    }

    fn index_entries(
        descriptor: &TypeDescriptor,
        object: &PersistedObject,
    ) -> BTreeSet<IndexEntry> {
        let type_name = object.object_type.as_str();
        let mut entries = BTreeSet::new();

        for (field, targets) in &object.relations {
            for target in targets {
                entries.insert(IndexEntry {
                    table: RELATION_INDEX,
                    row: target.as_str().as_bytes().to_vec(),
                    name: index::build_column_name(
                        type_name,
                        field,
                        object.creation_time,
                        &object.id,
                    ),
                });
            }
        }

        if let Some(container_field) = descriptor.label_container
            && !object.label.is_empty()
        {
            let label = index::normalize_label(&object.label);
            for container in object.relation(container_field) {
                entries.insert(IndexEntry {
                    table: LABEL_INDEX,
                    row: container.as_str().as_bytes().to_vec(),
                    name: index::build_column_name(
                        type_name,
                        &label,
                        object.creation_time,
                        &object.id,
                    ),
                });
            }
        }

        if let (true, Some(time)) = (object.inactive, object.inactivation_time) {
            entries.insert(IndexEntry {
                table: DECOMMISSIONED_INDEX,
                row: descriptor.table.as_bytes().to_vec(),
                name: index::build_column_name(INACTIVE_DISCRIMINATOR, "", time, &object.id),
            });
        }

        entries
    }

    fn validate(descriptor: &TypeDescriptor, object: &PersistedObject) -> Result<()> {
        for field in object.relations.keys() {
            if descriptor.relation(field).is_none() {
                return Err(Error::InvalidInput(format!(
                    "{} has no relation field '{field}'",
                    object.object_type
                )));
            }
        }
        Ok(())
    }
}

impl ObjectStore for IndexedObjectStore {
    fn query_object(
        &self,
        object_type: ObjectType,
        id: &ObjectId,
    ) -> Result<Option<PersistedObject>> {
        let descriptor = self.registry.descriptor(object_type)?;
        self.load(descriptor, id)
    }

    fn query_inactive_objects(
        &self,
        object_type: ObjectType,
        older_than: Option<TimeToken>,
    ) -> Result<InactiveObjects<'_>> {
        let hits = self.constraints.decommissioned(object_type, older_than)?.iter()?;
        Ok(Box::new(hits.map(|hit| {
            let hit = hit?;
            let inactivation_time = hit.time_token.ok_or_else(|| {
                Error::DataIntegrity(format!("decommissioned entry for {} has no time", hit.id))
            })?;
            Ok(InactiveObject {
                id: hit.id,
                inactivation_time,
            })
        })))
    }

    #[instrument(
        level = "debug",
        skip(self, object),
        fields(object_type = %object.object_type, id = %object.id)
    )]
    fn persist_object(&self, object: &PersistedObject) -> Result<()> {
        let descriptor = self.registry.descriptor(object.object_type)?;
        Self::validate(descriptor, object)?;

        let existing = self.load(descriptor, &object.id)?;
        let mut record = object.clone();
        if let Some(previous) = &existing {
            if previous.inactive && !record.inactive {
                return Err(Error::InvalidInput(format!(
                    "{} is decommissioned and cannot be reactivated",
                    object.id
                )));
            }
            record.creation_time = previous.creation_time;
            if previous.inactive {
                record.inactivation_time = previous.inactivation_time.or(record.inactivation_time);
            }
        }
        if record.inactive {
            record.inactivation_time.get_or_insert_with(TimeToken::now);
        } else {
            record.inactivation_time = None;
        }

        let new_entries = Self::index_entries(descriptor, &record);
        let old_entries = existing
            .as_ref()
            .map(|previous| Self::index_entries(descriptor, previous))
            .unwrap_or_default();

        // Index entries are written before the row and dropped after it.
        for entry in new_entries.difference(&old_entries) {
            self.store.put(entry.table, &entry.row, &entry.name, &[])?;
        }
        let bytes = serde_json::to_vec(&record).map_err(|e| Error::OperationFailed {
            operation: "serialize_object".to_string(),
            cause: e.to_string(),
        })?;
        self.store
            .put(descriptor.table, record.id.as_str().as_bytes(), OBJECT_COLUMN, &bytes)?;
        for entry in old_entries.difference(&new_entries) {
            self.store.delete(entry.table, &entry.row, &entry.name)?;
        }

        debug!(
            entries_added = new_entries.difference(&old_entries).count(),
            entries_removed = old_entries.difference(&new_entries).count(),
            "Persisted object"
        );
        Ok(())
    }

    #[instrument(
        level = "debug",
        skip(self, object),
        fields(object_type = %object.object_type, id = %object.id)
    )]
    fn remove_object(&self, object: &PersistedObject) -> Result<bool> {
        let descriptor = self.registry.descriptor(object.object_type)?;
        let stored = self.load(descriptor, &object.id)?;
        let existed = stored.is_some();
        let owner = stored.as_ref().unwrap_or(object);

        // Owned entries are dropped before the row.
        for entry in Self::index_entries(descriptor, owner) {
            self.store.delete(entry.table, &entry.row, &entry.name)?;
        }
        self.store
            .delete(descriptor.table, object.id.as_str().as_bytes(), OBJECT_COLUMN)?;

        debug!(existed, "Removed object");
        Ok(existed)
    }

    fn remove_stale_inactive(
        &self,
        object_type: ObjectType,
        entry: &InactiveObject,
    ) -> Result<bool> {
        let descriptor = self.registry.descriptor(object_type)?;
        if self.load(descriptor, &entry.id)?.is_some() {
            return Ok(false);
        }
        let name = index::build_column_name(
            INACTIVE_DISCRIMINATOR,
            "",
            entry.inactivation_time,
            &entry.id,
        );
        self.store.delete(DECOMMISSIONED_INDEX, descriptor.table.as_bytes(), &name)?;
        debug!(id = %entry.id, "Dropped stale decommissioned entry");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ColumnRange, MemoryColumnStore};

    fn setup() -> (Arc<MemoryColumnStore>, IndexedObjectStore) {
        let columns = Arc::new(MemoryColumnStore::new());
        let store = IndexedObjectStore::new(
            Arc::clone(&columns) as Arc<dyn ColumnStore>,
            Arc::new(TypeRegistry::builtin()),
        );
        (columns, store)
    }

    fn project() -> PersistedObject {
        PersistedObject::new(
            ObjectType::Project,
            ObjectId::generate(ObjectType::Project, "site1"),
            "proj",
        )
    }

    fn volume_in(project: &PersistedObject, label: &str) -> PersistedObject {
        PersistedObject::new(
            ObjectType::Volume,
            ObjectId::generate(ObjectType::Volume, "site1"),
            label,
        )
        .with_relation("project", project.id.clone())
    }

    #[test]
    fn test_persist_and_query_roundtrip() {
        let (_, store) = setup();
        let project = project();
        store.persist_object(&project).expect("persist");
        let loaded = store
            .query_object(ObjectType::Project, &project.id)
            .expect("query")
            .expect("exists");
        assert_eq!(loaded, project);
        assert!(
            store
                .query_object(ObjectType::Volume, &project.id)
                .expect("query")
                .is_none()
        );
    }

    #[test]
    fn test_relation_and_label_entries() {
        let (columns, store) = setup();
        let project = project();
        let volume = volume_in(&project, "Gold-1");
        store.persist_object(&volume).expect("persist");

        let row = project.id.as_str().as_bytes();
        assert_eq!(columns.row_len(RELATION_INDEX, row), 1);
        assert_eq!(columns.row_len(LABEL_INDEX, row), 1);

        let hits: Vec<_> = store
            .constraints()
            .label_prefix(ObjectType::Volume, &project.id, "gold")
            .expect("label-indexed")
            .iter()
            .expect("valid")
            .map(|h| h.expect("hit").id)
            .collect();
        assert_eq!(hits, vec![volume.id.clone()]);
    }

    #[test]
    fn test_update_replaces_stale_entries() {
        let (columns, store) = setup();
        let first = project();
        let second = project();
        let mut volume = volume_in(&first, "a");
        store.persist_object(&volume).expect("persist");

        volume.clear_relation("project");
        volume.add_relation("project", second.id.clone());
        volume.label = "b".into();
        store.persist_object(&volume).expect("update");

        assert_eq!(columns.row_len(RELATION_INDEX, first.id.as_str().as_bytes()), 0);
        assert_eq!(columns.row_len(LABEL_INDEX, first.id.as_str().as_bytes()), 0);
        assert_eq!(columns.row_len(RELATION_INDEX, second.id.as_str().as_bytes()), 1);
        assert_eq!(columns.row_len(LABEL_INDEX, second.id.as_str().as_bytes()), 1);
    }

    #[test]
    fn test_unknown_relation_rejected() {
        let (_, store) = setup();
        let mut object = project();
        object.add_relation("pool", ObjectId::generate(ObjectType::StoragePool, "site1"));
        assert!(matches!(store.persist_object(&object), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_decommission_cannot_be_undone() {
        let (_, store) = setup();
        let mut object = project();
        let time = object.mark_inactive();
        store.persist_object(&object).expect("persist");

        let mut reactivated = object.clone();
        reactivated.inactive = false;
        assert!(matches!(
            store.persist_object(&reactivated),
            Err(Error::InvalidInput(_))
        ));

        let mut retimed = object.clone();
        retimed.inactivation_time = Some(TimeToken::now());
        store.persist_object(&retimed).expect("persist");
        let loaded = store
            .query_object(ObjectType::Project, &object.id)
            .expect("query")
            .expect("exists");
        assert_eq!(loaded.inactivation_time, Some(time));
    }

    #[test]
    fn test_query_inactive_objects_in_time_order() {
        let (_, store) = setup();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let mut object = project();
            object.mark_inactive();
            store.persist_object(&object).expect("persist");
            ids.push(object.id);
        }
        store.persist_object(&project()).expect("persist active");

        let listed: Vec<ObjectId> = store
            .query_inactive_objects(ObjectType::Project, None)
            .expect("listing")
            .map(|entry| entry.map(|e| e.id))
            .collect::<Result<_>>()
            .expect("pages");
        assert_eq!(listed, ids);
    }

    #[test]
    fn test_remove_object_drops_owned_entries() {
        let (columns, store) = setup();
        let project = project();
        let mut volume = volume_in(&project, "gold");
        volume.mark_inactive();
        store.persist_object(&volume).expect("persist");

        assert!(store.remove_object(&volume).expect("remove"));
        assert!(!store.remove_object(&volume).expect("remove again"));

        let row = project.id.as_str().as_bytes();
        assert_eq!(columns.row_len(RELATION_INDEX, row), 0);
        assert_eq!(columns.row_len(LABEL_INDEX, row), 0);
        assert!(
            columns
                .scan(DECOMMISSIONED_INDEX, b"Volume", &ColumnRange::all())
                .expect("scan")
                .is_empty()
        );
    }

    #[test]
    fn test_remove_stale_inactive_entry() {
        let (columns, store) = setup();
        let mut kept = project();
        kept.mark_inactive();
        store.persist_object(&kept).expect("persist");
        let mut orphan = project();
        let time = orphan.mark_inactive();
        store.persist_object(&orphan).expect("persist");
        columns
            .delete("Project", orphan.id.as_str().as_bytes(), OBJECT_COLUMN)
            .expect("drop row");

        let entries: Vec<InactiveObject> = store
            .query_inactive_objects(ObjectType::Project, None)
            .expect("listing")
            .collect::<Result<_>>()
            .expect("pages");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].inactivation_time, time);

        assert!(!store.remove_stale_inactive(ObjectType::Project, &entries[0]).expect("kept"));
        assert!(store.remove_stale_inactive(ObjectType::Project, &entries[1]).expect("orphan"));
        assert_eq!(columns.row_len(DECOMMISSIONED_INDEX, b"Project"), 1);
    }
}
