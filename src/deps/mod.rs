//! Dependency checking.
//!
//! "Does anything still reference this object?" is answered in two steps:
//!
//! 1. [`LocalDependencyChecker`] scans the relation index of every field that
//!    can reference the object's type and stops at the first live referrer.
//! 2. For geo-replicated types with no local referrer,
//!    [`GeoDependencyChecker`] asks every remote site. Any doubt (a site that
//!    is not connected, a failed listing, a failed RPC) is reported as
//!    [`DependencyDescriptor::Unverifiable`], which callers must treat as
//!    "dependency present".

mod geo;
mod http;
mod local;
mod site;
mod tracker;

pub use geo::GeoDependencyChecker;
pub use http::{GeoDependencyResponse, HttpGeoClient};
pub use local::LocalDependencyChecker;
pub use site::{ConnectionStatus, GeoClient, Site, SiteDirectory, StaticSiteDirectory};
pub use tracker::{DependencyTracker, Referrer};

use crate::Result;
use crate::models::{ObjectId, ObjectType};
use serde::Serialize;
use std::fmt;

/// Why an object cannot be reclaimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyDescriptor {
    /// A local object references it.
    Local {
        /// Referencing type.
        referrer: ObjectType,
        /// Relation field holding the reference.
        field: String,
        /// The referencing object.
        id: ObjectId,
    },
    /// A remote site reported a referencing type.
    Remote {
        /// Reporting site.
        site: String,
        /// Type name reported by the site.
        dependency: String,
    },
    /// The answer is unknown; treated as a dependency.
    Unverifiable {
        /// Why the check could not complete.
        reason: String,
    },
}

impl DependencyDescriptor {
    /// Returns the referencing type name, or an empty string when unknown.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Local { referrer, .. } => referrer.as_str(),
            Self::Remote { dependency, .. } => dependency,
            Self::Unverifiable { .. } => "",
        }
    }
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { referrer, field, id } => {
                write!(f, "referenced by {referrer} {id} via '{field}'")
            },
            Self::Remote { site, dependency } => {
                write!(f, "referenced by {dependency} on site {site}")
            },
            Self::Unverifiable { reason } => write!(f, "dependency unverifiable: {reason}"),
        }
    }
}

/// Dependency check for one object.
pub trait DependencyCheck: Send + Sync {
    /// Returns the first dependency found, or `None` if nothing references
    /// the object.
    ///
    /// With `only_active`, referrers that are themselves decommissioned (or
    /// no longer exist) do not count.
    ///
    /// # Errors
    ///
    /// Returns an error if a local index or object read fails.
    fn has_dependency(
        &self,
        id: &ObjectId,
        object_type: ObjectType,
        only_active: bool,
    ) -> Result<Option<DependencyDescriptor>>;
}
