//! Decommission (soft delete) of persisted objects.

use crate::models::{ObjectId, ObjectType, TimeToken};
use crate::storage::ObjectStore;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

/// Service marking objects inactive.
///
/// Decommissioning is the only way application code retires an object; the
/// garbage collector removes it later, once nothing references it.
pub struct DecommissionService {
    objects: Arc<dyn ObjectStore>,
}

impl DecommissionService {
    /// Creates a new decommission service.
    #[must_use]
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self { objects }
    }

    /// Decommissions an object and returns its inactivation time.
    ///
    /// Calling it again is a no-op that returns the original time.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be found or updated.
    #[instrument(skip(self), fields(id = %id, object_type = %object_type))]
    pub fn decommission(&self, object_type: ObjectType, id: &ObjectId) -> Result<TimeToken> {
        let mut object = self
            .objects
            .query_object(object_type, id)?
            .ok_or_else(|| Error::OperationFailed {
                operation: "decommission".to_string(),
                cause: format!("object not found: {id}"),
            })?;

        if object.inactive
            && let Some(time) = object.inactivation_time
        {
            tracing::debug!(inactivation_time = %time, "Object already decommissioned");
            return Ok(time);
        }

        let time = object.mark_inactive();
        self.objects.persist_object(&object)?;

        tracing::info!(inactivation_time = %time, "Decommissioned object");
        metrics::counter!("decommission_total", "type" => object_type.as_str()).increment(1);
        Ok(time)
    }
}
