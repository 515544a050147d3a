//! Secondary index layout.
//!
//! Three index tables live next to the object tables in the column store:
//!
//! | Table | Row key | Column name |
//! |-------|---------|-------------|
//! | [`RELATION_INDEX`] | referenced object id | `(referrer type, field, time, referrer id)` |
//! | [`LABEL_INDEX`] | label container id | `(type, folded label, time, object id)` |
//! | [`DECOMMISSIONED_INDEX`] | type table name | `("inactive", "", inactivation time, object id)` |
//!
//! Column names are encoded with [`encoding`] so that byte order is tuple order.

pub mod encoding;

pub use encoding::{
    IndexColumnName, build_column_name, discriminator_prefix, normalize_label, prefix_bounds,
    prefix_successor, secondary_exact_prefix, secondary_starts_with,
};

use crate::models::{ObjectId, TypeDescriptor};
use std::fmt;

/// Relation index: "object A references object B" edges, keyed by B.
pub const RELATION_INDEX: &str = "RelationIndex";

/// Case-insensitive label index, keyed by the label's container object.
pub const LABEL_INDEX: &str = "LabelPrefixIndex";

/// Decommissioned objects of one type, ordered by inactivation time.
pub const DECOMMISSIONED_INDEX: &str = "Decommissioned";

/// Discriminator used for every column of the decommissioned index.
pub const INACTIVE_DISCRIMINATOR: &str = "inactive";

/// Row key of an index row.
///
/// An empty key never addresses a row; constraints built on one are invalid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct IndexKey(String);

impl IndexKey {
    /// Creates a key from a raw string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key of a container-scoped row: the container id itself.
    #[must_use]
    pub fn for_container(container: &ObjectId) -> Self {
        Self(container.as_str().to_string())
    }

    /// Key of a type-scoped row: the type's table name.
    #[must_use]
    pub fn for_type(descriptor: &TypeDescriptor) -> Self {
        Self(descriptor.table.to_string())
    }

    /// Returns `true` if the key is empty or blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key bytes used as the store row key.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ObjectId> for IndexKey {
    fn from(id: &ObjectId) -> Self {
        Self::for_container(id)
    }
}
