//! Object types and the type registry.
//!
//! Each [`ObjectType`] maps to exactly one [`TypeDescriptor`]: its logical
//! table, its label field and the relation fields through which it references
//! other objects. The registry is built once and passed down explicitly.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Declared type of a persisted object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// A tenant (organisation).
    Tenant,
    /// A project owned by a tenant.
    Project,
    /// A virtual array (group of connected storage).
    VirtualArray,
    /// A virtual pool (storage service level).
    VirtualPool,
    /// A physical storage system.
    StorageSystem,
    /// A storage pool on a storage system.
    StoragePool,
    /// A block volume.
    Volume,
    /// A snapshot of a block volume.
    BlockSnapshot,
    /// A group of volumes exported to hosts.
    ExportGroup,
}

impl ObjectType {
    /// Returns all object types.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Tenant,
            Self::Project,
            Self::VirtualArray,
            Self::VirtualPool,
            Self::StorageSystem,
            Self::StoragePool,
            Self::Volume,
            Self::BlockSnapshot,
            Self::ExportGroup,
        ]
    }

    /// Returns the type name, also used as the index discriminator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tenant => "Tenant",
            Self::Project => "Project",
            Self::VirtualArray => "VirtualArray",
            Self::VirtualPool => "VirtualPool",
            Self::StorageSystem => "StorageSystem",
            Self::StoragePool => "StoragePool",
            Self::Volume => "Volume",
            Self::BlockSnapshot => "BlockSnapshot",
            Self::ExportGroup => "ExportGroup",
        }
    }

    /// Parses a type name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("unknown object type: {s}")))
    }
}

/// A relation field: `owner.name` holds ids of `references` objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name, used as the secondary value in the relation index.
    pub name: &'static str,
    /// Type of the objects this field points at.
    pub references: ObjectType,
}

impl FieldDescriptor {
    /// Creates a relation field descriptor.
    #[must_use]
    pub const fn relation(name: &'static str, references: ObjectType) -> Self {
        Self { name, references }
    }
}

/// Static description of one object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// The described type.
    pub object_type: ObjectType,
    /// Logical table (column family) holding object rows.
    pub table: &'static str,
    /// Whether instances and relations may be created on any site.
    pub geo_replicated: bool,
    /// Relation fields declared by this type.
    pub relations: Vec<FieldDescriptor>,
    /// Field whose value is the label-index container, if labels are indexed.
    pub label_container: Option<&'static str>,
}

impl TypeDescriptor {
    /// Creates a descriptor with no relation fields.
    #[must_use]
    pub const fn new(object_type: ObjectType, table: &'static str) -> Self {
        Self {
            object_type,
            table,
            geo_replicated: false,
            relations: Vec::new(),
            label_container: None,
        }
    }

    /// Marks the type as geo-replicated.
    #[must_use]
    pub const fn geo_replicated(mut self) -> Self {
        self.geo_replicated = true;
        self
    }

    /// Adds a relation field.
    #[must_use]
    pub fn with_relation(mut self, name: &'static str, references: ObjectType) -> Self {
        self.relations.push(FieldDescriptor::relation(name, references));
        self
    }

    /// Indexes labels under the id held by relation field `field`.
    #[must_use]
    pub const fn with_label_container(mut self, field: &'static str) -> Self {
        self.label_container = Some(field);
        self
    }

    /// Looks up a relation field by name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&FieldDescriptor> {
        self.relations.iter().find(|f| f.name == name)
    }
}

/// Registry mapping each object type to its descriptor.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    descriptors: HashMap<ObjectType, TypeDescriptor>,
}

impl TypeRegistry {
    /// Creates a registry from explicit descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a type is described twice, two
    /// types share a table, or a label container names an undeclared field.
    pub fn new(descriptors: Vec<TypeDescriptor>) -> Result<Self> {
        let mut by_type = HashMap::with_capacity(descriptors.len());
        let mut tables = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if let Some(field) = descriptor.label_container
                && descriptor.relation(field).is_none()
            {
                return Err(Error::Configuration(format!(
                    "{}: label container '{field}' is not a relation field",
                    descriptor.object_type
                )));
            }
            if let Some(other) = tables.insert(descriptor.table, descriptor.object_type) {
                return Err(Error::Configuration(format!(
                    "table '{}' is shared by {other} and {}",
                    descriptor.table, descriptor.object_type
                )));
            }
            let object_type = descriptor.object_type;
            if by_type.insert(object_type, descriptor).is_some() {
                return Err(Error::Configuration(format!(
                    "object type {object_type} is registered twice"
                )));
            }
        }

        Ok(Self {
            descriptors: by_type,
        })
    }

    /// Returns the built-in storage-orchestration object model.
    #[must_use]
    pub fn builtin() -> Self {
        let descriptors = vec![
            TypeDescriptor::new(ObjectType::Tenant, "TenantOrg").geo_replicated(),
            TypeDescriptor::new(ObjectType::Project, "Project")
                .geo_replicated()
                .with_relation("tenant", ObjectType::Tenant)
                .with_label_container("tenant"),
            TypeDescriptor::new(ObjectType::VirtualArray, "VirtualArray").geo_replicated(),
            TypeDescriptor::new(ObjectType::VirtualPool, "VirtualPool")
                .geo_replicated()
                .with_relation("virtual_array", ObjectType::VirtualArray),
            TypeDescriptor::new(ObjectType::StorageSystem, "StorageSystem"),
            TypeDescriptor::new(ObjectType::StoragePool, "StoragePool")
                .with_relation("storage_device", ObjectType::StorageSystem),
            TypeDescriptor::new(ObjectType::Volume, "Volume")
                .with_relation("project", ObjectType::Project)
                .with_relation("pool", ObjectType::StoragePool)
                .with_relation("virtual_pool", ObjectType::VirtualPool)
                .with_relation("virtual_array", ObjectType::VirtualArray)
                .with_label_container("project"),
            TypeDescriptor::new(ObjectType::BlockSnapshot, "BlockSnapshot")
                .with_relation("parent", ObjectType::Volume)
                .with_relation("project", ObjectType::Project)
                .with_label_container("project"),
            TypeDescriptor::new(ObjectType::ExportGroup, "ExportGroup")
                .with_relation("project", ObjectType::Project)
                .with_relation("volumes", ObjectType::Volume)
                .with_relation("virtual_array", ObjectType::VirtualArray)
                .with_label_container("project"),
        ];

        // The built-in descriptors are statically consistent.
        Self {
            descriptors: descriptors
                .into_iter()
                .map(|d| (d.object_type, d))
                .collect(),
        }
    }

    /// Returns the descriptor for a type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the type is not registered.
    pub fn descriptor(&self, object_type: ObjectType) -> Result<&TypeDescriptor> {
        self.descriptors.get(&object_type).ok_or_else(|| {
            Error::Configuration(format!("object type {object_type} is not registered"))
        })
    }

    /// Returns `true` if the type is registered and geo-replicated.
    #[must_use]
    pub fn is_geo_replicated(&self, object_type: ObjectType) -> bool {
        self.descriptors
            .get(&object_type)
            .is_some_and(|d| d.geo_replicated)
    }

    /// Returns all registered types in declaration order of [`ObjectType::all`].
    #[must_use]
    pub fn types(&self) -> Vec<ObjectType> {
        ObjectType::all()
            .iter()
            .copied()
            .filter(|t| self.descriptors.contains_key(t))
            .collect()
    }

    /// Iterates over all descriptors.
    pub fn descriptors(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.values()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
