//! Geo-aware dependency check.

use super::site::{ConnectionStatus, GeoClient, SiteDirectory};
use super::{DependencyCheck, DependencyDescriptor};
use crate::Result;
use crate::models::{ObjectId, ObjectType, TypeRegistry};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Extends a local check to every remote site for geo-replicated types.
///
/// Never reports "no dependency" without an explicit empty answer from every
/// remote site. A failed site listing, a site that is not connected, or a
/// failed RPC all yield [`DependencyDescriptor::Unverifiable`].
pub struct GeoDependencyChecker {
    local: Arc<dyn DependencyCheck>,
    registry: Arc<TypeRegistry>,
    sites: Arc<dyn SiteDirectory>,
    client: Arc<dyn GeoClient>,
    local_site: String,
}

impl GeoDependencyChecker {
    /// Creates a checker for the site named `local_site`.
    #[must_use]
    pub fn new(
        local: Arc<dyn DependencyCheck>,
        registry: Arc<TypeRegistry>,
        sites: Arc<dyn SiteDirectory>,
        client: Arc<dyn GeoClient>,
        local_site: impl Into<String>,
    ) -> Self {
        Self {
            local,
            registry,
            sites,
            client,
            local_site: local_site.into(),
        }
    }

    fn remote_dependency(
        &self,
        id: &ObjectId,
        object_type: ObjectType,
        only_active: bool,
    ) -> Option<DependencyDescriptor> {
        let sites = match self.sites.list_sites() {
            Ok(sites) => sites,
            Err(e) => {
                warn!(error = %e, "Cannot list sites, assuming dependency");
                return Some(DependencyDescriptor::Unverifiable {
                    reason: format!("site listing failed: {e}"),
                });
            },
        };
        let remotes: Vec<_> = sites
            .into_iter()
            .filter(|site| site.id != self.local_site)
            .collect();

        if let Some(site) = remotes
            .iter()
            .find(|site| site.status != ConnectionStatus::Connected)
        {
            warn!(
                site = %site.id,
                status = %site.status,
                %id,
                "Remote site not connected, assuming dependency"
            );
            return Some(DependencyDescriptor::Unverifiable {
                reason: format!("site {} is {}", site.id, site.status),
            });
        }

        for site in &remotes {
            match self
                .client
                .check_dependency(site, object_type, id, only_active)
            {
                Ok(answer) if answer.is_empty() => {
                    debug!(site = %site.id, %id, "No remote dependency");
                },
                Ok(answer) => {
                    return Some(DependencyDescriptor::Remote {
                        site: site.id.clone(),
                        dependency: answer,
                    });
                },
                Err(e) => {
                    warn!(
                        site = %site.id,
                        %id,
                        error = %e,
                        "Remote dependency check failed, assuming dependency"
                    );
                    return Some(DependencyDescriptor::Unverifiable {
                        reason: e.to_string(),
                    });
                },
            }
        }
        None
    }
}

impl DependencyCheck for GeoDependencyChecker {
    #[instrument(
        name = "reclaim.deps.has_dependency",
        skip(self),
        fields(id = %id, object_type = %object_type)
    )]
    fn has_dependency(
        &self,
        id: &ObjectId,
        object_type: ObjectType,
        only_active: bool,
    ) -> Result<Option<DependencyDescriptor>> {
        if let Some(local) = self.local.has_dependency(id, object_type, only_active)? {
            metrics::counter!("geo_dependency_checks_total", "outcome" => "local").increment(1);
            return Ok(Some(local));
        }
        if !self.registry.is_geo_replicated(object_type) {
            return Ok(None);
        }

        let found = self.remote_dependency(id, object_type, only_active);
        let outcome = match &found {
            None => "none",
            Some(DependencyDescriptor::Unverifiable { .. }) => "unverifiable",
            Some(_) => "remote",
        };
        metrics::counter!("geo_dependency_checks_total", "outcome" => outcome).increment(1);
        Ok(found)
    }
}
