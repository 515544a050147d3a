//! CLI command implementations.
//!
//! Each submodule implements one `reclaim` subcommand on top of a
//! [`ServiceContainer`](crate::services::ServiceContainer).
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gc` | Run one GC cycle per type now and print the summaries |
//! | `run` | Run the periodic GC scheduler until interrupted |
//! | `deps` | Show whether anything references an object |
//! | `query` | List label or decommissioned index hits |
//! | `decommission` | Mark an object inactive |
//!
//! # Example Usage
//!
//! ```bash
//! # Preview a cycle for volumes
//! reclaim gc --type Volume --dry-run
//!
//! # Who still uses this pool?
//! reclaim deps urn:reclaim:StoragePool:4f7c...:site1 --type StoragePool
//!
//! # Volumes in a project whose label starts with "db"
//! reclaim query label --type Volume --container urn:reclaim:Project:...:site1 --prefix db
//! ```

pub mod decommission;
pub mod deps;
pub mod gc;
pub mod query;
pub mod run;

use crate::models::{ObjectId, ObjectType, TypeRegistry};
use crate::{Error, Result};

/// Parses an object type name.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the name is not a known type.
pub fn parse_object_type(name: &str) -> Result<ObjectType> {
    name.parse()
}

/// Parses a list of type names, defaulting to every registered type.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if any name is not a known type.
pub fn parse_object_types(names: &[String], registry: &TypeRegistry) -> Result<Vec<ObjectType>> {
    if names.is_empty() {
        return Ok(registry.types());
    }
    names.iter().map(|name| parse_object_type(name)).collect()
}

/// Parses an object id and checks it names `object_type`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the id is malformed or belongs to
/// another type.
pub fn parse_object_id(raw: &str, object_type: ObjectType) -> Result<ObjectId> {
    let id = ObjectId::parse(raw)?;
    match id.type_segment() {
        Some(segment) if segment != object_type.as_str() => Err(Error::InvalidInput(format!(
            "{id} is not a {object_type} id"
        ))),
        _ => Ok(id),
    }
}
