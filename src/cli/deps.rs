//! Dependency lookup CLI command.

// Allow print_stdout in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]

use crate::deps::DependencyDescriptor;
use crate::models::{ObjectId, ObjectType};
use crate::services::ServiceContainer;
use crate::{Error, Result};

/// Prints whatever still references `id`.
///
/// # Errors
///
/// Returns an error if a local lookup fails.
pub fn execute(
    container: &ServiceContainer,
    object_type: ObjectType,
    id: &ObjectId,
    include_inactive: bool,
    json: bool,
) -> Result<()> {
    let found = container
        .dependency_checker()
        .has_dependency(id, object_type, !include_inactive)?;

    if json {
        let rendered = serde_json::to_string_pretty(&found).map_err(|e| Error::OperationFailed {
            operation: "render_dependency".to_string(),
            cause: e.to_string(),
        })?;
        println!("{rendered}");
    } else {
        println!("{}", describe(id, found.as_ref()));
    }
    Ok(())
}

/// Renders a one-line answer.
#[must_use]
pub fn describe(id: &ObjectId, found: Option<&DependencyDescriptor>) -> String {
    found.map_or_else(
        || format!("{id}: no dependencies, eligible for collection"),
        |descriptor| format!("{id}: in use ({descriptor})"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let id = ObjectId::generate(ObjectType::StoragePool, "site1");
        assert!(describe(&id, None).ends_with("eligible for collection"));

        let remote = DependencyDescriptor::Remote {
            site: "site2".to_string(),
            dependency: "Volume".to_string(),
        };
        assert!(describe(&id, Some(&remote)).contains("in use"));
    }
}
