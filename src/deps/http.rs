//! HTTP implementation of the geo dependency RPC.
//!
//! `GET {endpoint}/geo/dependencies?type=<Type>&id=<id>&active_only=<bool>`
//! answers `{"dependency": "<type name or empty>"}`.

use super::site::{GeoClient, Site};
use crate::models::{ObjectId, ObjectType};
use crate::storage::{CircuitBreaker, ResilienceConfig};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tracing::debug;

/// Body of a dependency RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeoDependencyResponse {
    /// Referencing type name; empty means no dependency.
    #[serde(default)]
    pub dependency: String,
}

/// Blocking HTTP geo client with a per-site circuit breaker.
///
/// The underlying client is built on first use so the handle can be created
/// inside an async context.
pub struct HttpGeoClient {
    timeout: Duration,
    breaker_config: ResilienceConfig,
    client: OnceLock<reqwest::blocking::Client>,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
}

impl HttpGeoClient {
    /// Creates a client with a per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            breaker_config: ResilienceConfig::default(),
            client: OnceLock::new(),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the circuit breaker configuration used for every site.
    #[must_use]
    pub fn with_breaker_config(mut self, config: ResilienceConfig) -> Self {
        self.breaker_config = config;
        self
    }

    fn client(&self) -> &reqwest::blocking::Client {
        self.client.get_or_init(|| {
            let mut builder = reqwest::blocking::Client::builder();
            if !self.timeout.is_zero() {
                builder = builder.timeout(self.timeout).connect_timeout(self.timeout);
            }
            builder.build().unwrap_or_else(|err| {
                tracing::warn!("Failed to build geo HTTP client: {err}");
                reqwest::blocking::Client::new()
            })
        })
    }

    fn with_breaker<T>(&self, site: &str, call: impl FnOnce() -> Result<T>) -> Result<T> {
        let allowed = {
            let mut breakers = self
                .breakers
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            breakers
                .entry(site.to_string())
                .or_insert_with(|| CircuitBreaker::new(&self.breaker_config, site))
                .allow()
        };
        if !allowed {
            return Err(Error::DependencyCheckFailed {
                site: site.to_string(),
                cause: "circuit breaker open".to_string(),
            });
        }

        let result = call();

        let mut breakers = self
            .breakers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(breaker) = breakers.get_mut(site) {
            if result.is_ok() {
                breaker.on_success();
            } else {
                breaker.on_failure();
            }
            metrics::gauge!("geo_circuit_breaker_state", "site" => site.to_string())
                .set(f64::from(breaker.state_value()));
        }
        result
    }

    fn request(
        &self,
        site: &Site,
        object_type: ObjectType,
        id: &ObjectId,
        only_active: bool,
    ) -> Result<String> {
        let failed = |cause: String| Error::DependencyCheckFailed {
            site: site.id.clone(),
            cause,
        };
        let url = format!("{}/geo/dependencies", site.endpoint.trim_end_matches('/'));
        debug!(site = %site.id, %url, %id, "Querying remote dependencies");

        let response = self
            .client()
            .get(&url)
            .query(&[
                ("type", object_type.as_str()),
                ("id", id.as_str()),
                ("active_only", if only_active { "true" } else { "false" }),
            ])
            .send()
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("status {}", response.status())));
        }

        let body: GeoDependencyResponse = response
            .json()
            .map_err(|e| failed(format!("malformed response: {e}")))?;
        Ok(body.dependency.trim().to_string())
    }
}

impl GeoClient for HttpGeoClient {
    fn check_dependency(
        &self,
        site: &Site,
        object_type: ObjectType,
        id: &ObjectId,
        only_active: bool,
    ) -> Result<String> {
        self.with_breaker(&site.id, || self.request(site, object_type, id, only_active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_defaults_to_no_dependency() {
        let body: GeoDependencyResponse = serde_json::from_str("{}").expect("json");
        assert!(body.dependency.is_empty());
        let body: GeoDependencyResponse =
            serde_json::from_str(r#"{"dependency":"Volume"}"#).expect("json");
        assert_eq!(body.dependency, "Volume");
    }

    #[test]
    fn test_unreachable_site_fails_and_trips_breaker() {
        let breaker = ResilienceConfig::default()
            .with_failure_threshold(1)
            .with_reset_timeout_ms(60_000);
        let client = HttpGeoClient::new(Duration::from_millis(200)).with_breaker_config(breaker);
        // Port 9 (discard) on localhost is expected to refuse connections.
        let site = Site::new("site2", "http://127.0.0.1:9");
        let id = ObjectId::generate(ObjectType::Project, "site1");

        let first = client.check_dependency(&site, ObjectType::Project, &id, true);
        assert!(matches!(
            first,
            Err(Error::DependencyCheckFailed { ref site, .. }) if site == "site2"
        ));

        let second = client
            .check_dependency(&site, ObjectType::Project, &id, true)
            .expect_err("breaker open");
        assert!(second.to_string().contains("circuit breaker open"));
    }
}
