//! Persisted objects.

use crate::models::{ObjectId, ObjectType, TimeToken};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An object stored in its type's logical table.
///
/// Objects are never removed by application code; they are decommissioned by
/// setting `inactive`, and only the garbage collector physically removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedObject {
    /// Unique identifier.
    pub id: ObjectId,
    /// Declared type.
    pub object_type: ObjectType,
    /// Human-readable label, indexed case-insensitively.
    #[serde(default)]
    pub label: String,
    /// Whether the object has been decommissioned.
    #[serde(default)]
    pub inactive: bool,
    /// When the object was created; orders its label and relation entries.
    #[serde(default = "TimeToken::now")]
    pub creation_time: TimeToken,
    /// When the object was decommissioned. Set exactly once.
    #[serde(default)]
    pub inactivation_time: Option<TimeToken>,
    /// Relation field values: field name to referenced ids.
    #[serde(default)]
    pub relations: BTreeMap<String, Vec<ObjectId>>,
}

impl PersistedObject {
    /// Creates a new active object.
    #[must_use]
    pub fn new(object_type: ObjectType, id: ObjectId, label: impl Into<String>) -> Self {
        Self {
            id,
            object_type,
            label: label.into(),
            inactive: false,
            creation_time: TimeToken::now(),
            inactivation_time: None,
            relations: BTreeMap::new(),
        }
    }

    /// Sets a single-valued relation field.
    #[must_use]
    pub fn with_relation(mut self, field: &str, target: ObjectId) -> Self {
        self.relations.insert(field.to_string(), vec![target]);
        self
    }

    /// Adds `target` to a (possibly multi-valued) relation field.
    pub fn add_relation(&mut self, field: &str, target: ObjectId) {
        let targets = self.relations.entry(field.to_string()).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// Clears a relation field.
    pub fn clear_relation(&mut self, field: &str) {
        self.relations.remove(field);
    }

    /// Returns the ids held by a relation field.
    #[must_use]
    pub fn relation(&self, field: &str) -> &[ObjectId] {
        self.relations.get(field).map_or(&[], Vec::as_slice)
    }

    /// Decommissions the object.
    ///
    /// The first call records the inactivation time; later calls are no-ops
    /// and return the original token.
    pub fn mark_inactive(&mut self) -> TimeToken {
        if let Some(token) = self.inactivation_time
            && self.inactive
        {
            return token;
        }
        let token = TimeToken::now();
        self.inactive = true;
        self.inactivation_time = Some(token);
        token
    }

    /// Returns `true` if the object is decommissioned strictly before `marker`.
    ///
    /// With no marker every decommissioned object qualifies.
    #[must_use]
    pub fn decommissioned_before(&self, marker: Option<TimeToken>) -> bool {
        match (self.inactive, self.inactivation_time, marker) {
            (false, _, _) => false,
            (true, _, None) => true,
            (true, Some(time), Some(marker)) => time < marker,
            (true, None, Some(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume() -> PersistedObject {
        PersistedObject::new(
            ObjectType::Volume,
            ObjectId::generate(ObjectType::Volume, "site1"),
            "vol-a",
        )
    }

    #[test]
    fn test_mark_inactive_sets_time_once() {
        let mut obj = volume();
        assert!(!obj.inactive);
        let first = obj.mark_inactive();
        let second = obj.mark_inactive();
        assert!(obj.inactive);
        assert_eq!(first, second);
        assert_eq!(obj.inactivation_time, Some(first));
    }

    #[test]
    fn test_relations() {
        let project = ObjectId::generate(ObjectType::Project, "site1");
        let mut obj = volume().with_relation("project", project.clone());
        assert_eq!(obj.relation("project"), std::slice::from_ref(&project));

        obj.add_relation("project", project.clone());
        assert_eq!(obj.relation("project").len(), 1);

        obj.clear_relation("project");
        assert!(obj.relation("project").is_empty());
    }

    #[test]
    fn test_decommissioned_before() {
        let mut obj = volume();
        assert!(!obj.decommissioned_before(None));

        let time = obj.mark_inactive();
        assert!(obj.decommissioned_before(None));
        assert!(!obj.decommissioned_before(Some(time)));
        assert!(obj.decommissioned_before(Some(TimeToken::floor(time.unix_millis() + 1))));
    }

    #[test]
    fn test_json_roundtrip_defaults() {
        let json = r#"{"id":"urn:reclaim:Volume:x:site1","object_type":"Volume"}"#;
        let obj: PersistedObject = serde_json::from_str(json).expect("valid json");
        assert!(!obj.inactive);
        assert!(obj.label.is_empty());
        assert!(obj.relations.is_empty());
    }
}
