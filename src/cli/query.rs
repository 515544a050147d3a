//! Index query CLI commands.

// Allow print_stdout in CLI module (consistent with main.rs)
#![allow(clippy::print_stdout)]

use crate::models::{ObjectId, ObjectType};
use crate::query::{Constraint, Hit};
use crate::services::ServiceContainer;
use crate::Result;

/// Lists objects in `container` whose label starts with `prefix`.
///
/// # Errors
///
/// Returns an error if the type has no label index or a page fetch fails.
pub fn label(
    services: &ServiceContainer,
    object_type: ObjectType,
    container: &ObjectId,
    prefix: &str,
    limit: Option<usize>,
) -> Result<()> {
    let constraint = services
        .constraints()
        .label_prefix(object_type, container, prefix)?;
    let hits = collect_hits(&constraint, limit)?;
    print_hits(&hits);
    Ok(())
}

/// Lists decommissioned objects of a type.
///
/// Without `all`, only objects past the retention delay (the GC candidates)
/// are listed.
///
/// # Errors
///
/// Returns an error if a page fetch fails.
pub fn decommissioned(
    services: &ServiceContainer,
    object_type: ObjectType,
    all: bool,
    limit: Option<usize>,
) -> Result<()> {
    let marker = if all {
        None
    } else {
        services.garbage_collector().retention().marker(object_type)
    };
    let constraint = services.constraints().decommissioned(object_type, marker)?;
    let hits = collect_hits(&constraint, limit)?;
    print_hits(&hits);
    Ok(())
}

/// Drains up to `limit` hits.
///
/// # Errors
///
/// Returns the first page fetch error.
pub fn collect_hits(constraint: &Constraint, limit: Option<usize>) -> Result<Vec<Hit>> {
    constraint
        .iter()?
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

fn print_hits(hits: &[Hit]) {
    for hit in hits {
        let when = hit
            .time_token
            .and_then(|t| t.to_datetime())
            .map_or_else(|| "-".to_string(), |dt| dt.to_rfc3339());
        match &hit.label {
            Some(label) => println!("{}\t{label}\t{when}", hit.id),
            None => println!("{}\t{when}", hit.id),
        }
    }
    println!("\n{} hit(s)", hits.len());
}
