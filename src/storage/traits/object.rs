//! Object store trait.

use crate::Result;
use crate::models::{ObjectId, ObjectType, PersistedObject, TimeToken};

/// One entry of the decommissioned index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactiveObject {
    /// The decommissioned object.
    pub id: ObjectId,
    /// Inactivation time recorded in the index entry.
    pub inactivation_time: TimeToken,
}

/// Lazy sequence of decommissioned objects, oldest first.
pub type InactiveObjects<'a> = Box<dyn Iterator<Item = Result<InactiveObject>> + Send + 'a>;

/// Narrow object read/write/query interface used by the garbage collector.
pub trait ObjectStore: Send + Sync {
    /// Loads one object, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] if the read fails, or
    /// [`crate::Error::DataIntegrity`] if the stored row cannot be decoded.
    fn query_object(
        &self,
        object_type: ObjectType,
        id: &ObjectId,
    ) -> Result<Option<PersistedObject>>;

    /// Lists decommissioned objects of a type.
    ///
    /// With `older_than` set, only objects whose inactivation time is strictly
    /// earlier are listed. The sequence pages lazily through the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing query cannot be built; page failures
    /// surface as items.
    fn query_inactive_objects(
        &self,
        object_type: ObjectType,
        older_than: Option<TimeToken>,
    ) -> Result<InactiveObjects<'_>>;

    /// Creates or updates an object and its index entries.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the write would reactivate a
    /// decommissioned object, or [`crate::Error::QueryFailed`] on store failure.
    fn persist_object(&self, object: &PersistedObject) -> Result<()>;

    /// Physically removes an object and the index entries it owns.
    ///
    /// Returns `false` if the object was already gone.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] on store failure.
    fn remove_object(&self, object: &PersistedObject) -> Result<bool>;

    /// Drops a decommissioned-index entry whose object row no longer exists.
    ///
    /// Returns `false` and leaves the entry alone if the object still exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::QueryFailed`] on store failure.
    fn remove_stale_inactive(
        &self,
        object_type: ObjectType,
        entry: &InactiveObject,
    ) -> Result<bool>;
}
