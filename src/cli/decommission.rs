//! Decommission CLI command.

// Allow print_stdout in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]

use crate::Result;
use crate::models::{ObjectId, ObjectType};
use crate::services::ServiceContainer;

/// Marks an object inactive and prints its inactivation time.
///
/// # Errors
///
/// Returns an error if the object does not exist or cannot be updated.
pub fn execute(container: &ServiceContainer, object_type: ObjectType, id: &ObjectId) -> Result<()> {
    let token = container.decommission().decommission(object_type, id)?;
    let when = token
        .to_datetime()
        .map_or_else(|| token.to_string(), |dt| dt.to_rfc3339());
    println!("Decommissioned {id} at {when}");
    Ok(())
}
