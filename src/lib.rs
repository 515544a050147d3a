//! # Reclaim
//!
//! Persistence core for a storage-orchestration object model kept in a
//! wide-column store.
//!
//! Reclaim provides three things on top of a keyed, sorted-column store:
//!
//! - **Composite secondary indexes**: byte-comparable column names built from
//!   `(type, secondary value, time-token, target id)` so that range and prefix
//!   scans return hits in a stable, documented order
//! - **Paginated constraint queries**: lazy hit iteration in bounded pages with
//!   exclusive-start continuation and an optional column filter
//! - **Dependency-aware garbage collection**: a per-type, cluster-locked cycle
//!   that physically removes decommissioned objects only when nothing (local or
//!   on a remote site) still references them
//!
//! ## Example
//!
//! ```rust,ignore
//! use reclaim::config::ReclaimConfig;
//! use reclaim::models::ObjectType;
//! use reclaim::services::ServiceContainer;
//!
//! let container = ServiceContainer::from_config(&ReclaimConfig::load_default())?;
//! let result = container.garbage_collector().run_cycle(ObjectType::Volume)?;
//! println!("{}", result.summary());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod deps;
pub mod gc;
pub mod index;
pub mod models;
pub mod observability;
pub mod query;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::ReclaimConfig;
pub use models::{ObjectId, ObjectType, PersistedObject, TimeToken, TypeRegistry};
pub use query::{Constraint, Hit, HitIterator};
pub use storage::{ColumnStore, ObjectStore};

/// Error type for reclaim operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed object ids, unknown type names, illegal state transitions |
/// | `Configuration` | An invalid constraint is executed, a config value is unusable |
/// | `QueryFailed` | The backing store fails while reading or writing a page/row |
/// | `DataIntegrity` | An index column or object row cannot be decoded |
/// | `LockUnavailable` | A cluster lock is held by another owner |
/// | `DependencyCheckFailed` | A remote site did not answer a dependency RPC |
/// | `OperationFailed` | Other infrastructure failures (config I/O, logging init) |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A query or component was configured incorrectly.
    ///
    /// Raised when:
    /// - A constraint with an empty index key is executed
    /// - A configuration value is out of range
    ///
    /// Never used to signal "no results": an empty scan is `Ok`.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A backing store read or write failed.
    ///
    /// Page fetches surface this to the iterator consumer without retrying.
    #[error("query '{operation}' failed: {cause}")]
    QueryFailed {
        /// The store operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Stored data could not be decoded.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// A cluster-wide lock is held elsewhere.
    #[error("lock unavailable: {0}")]
    LockUnavailable(String),

    /// A remote dependency check could not be completed.
    ///
    /// The geo checker converts this into a fail-safe "dependency present".
    #[error("dependency check on site '{site}' failed: {cause}")]
    DependencyCheckFailed {
        /// The remote site that failed to answer.
        site: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds a [`Error::QueryFailed`] from any displayable cause.
    pub fn query_failed(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::QueryFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for reclaim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("bad id".to_string());
        assert_eq!(err.to_string(), "invalid input: bad id");

        let err = Error::query_failed("scan", "connection reset");
        assert_eq!(err.to_string(), "query 'scan' failed: connection reset");

        let err = Error::DependencyCheckFailed {
            site: "site2".to_string(),
            cause: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "dependency check on site 'site2' failed: timeout"
        );
    }

    #[test]
    fn test_configuration_error_is_distinct_from_empty_result() {
        let err = Error::Configuration("empty index key".to_string());
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(err.to_string(), "configuration error: empty index key");
    }

    #[test]
    fn test_current_timestamp_millis() {
        assert!(current_timestamp_millis() > 1_600_000_000_000);
    }
}
