//! Remote sites and the geo RPC boundary.

use crate::Result;
use crate::models::{ObjectId, ObjectType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Replication link state of a remote site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Fully connected.
    #[default]
    Connected,
    /// Being disconnected.
    Disconnecting,
    /// Disconnected.
    Disconnected,
}

impl ConnectionStatus {
    /// Returns the status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cooperating site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Short site id, e.g. `site2`.
    pub id: String,
    /// Base URL of the site's geo service.
    pub endpoint: String,
    /// Current link state.
    #[serde(default)]
    pub status: ConnectionStatus,
}

impl Site {
    /// Creates a connected site.
    #[must_use]
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            status: ConnectionStatus::Connected,
        }
    }

    /// Sets the link state.
    #[must_use]
    pub const fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.status = status;
        self
    }
}

/// Source of the current site list.
pub trait SiteDirectory: Send + Sync {
    /// Lists every known site, the local one included.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    fn list_sites(&self) -> Result<Vec<Site>>;
}

/// Site directory with a fixed list, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticSiteDirectory {
    sites: Vec<Site>,
}

impl StaticSiteDirectory {
    /// Creates a directory serving `sites`.
    #[must_use]
    pub const fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }
}

impl SiteDirectory for StaticSiteDirectory {
    fn list_sites(&self) -> Result<Vec<Site>> {
        Ok(self.sites.clone())
    }
}

/// Client for the remote dependency RPC.
pub trait GeoClient: Send + Sync {
    /// Asks `site` whether anything there references `id`.
    ///
    /// Returns the referencing type name, or an empty string for "none".
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DependencyCheckFailed`] on any communication
    /// or decoding failure.
    fn check_dependency(
        &self,
        site: &Site,
        object_type: ObjectType,
        id: &ObjectId,
        only_active: bool,
    ) -> Result<String>;
}
