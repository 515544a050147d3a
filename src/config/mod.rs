//! Configuration management.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file, and `RECLAIM_*` environment variables.
//!
//! ```toml
//! node_id = "node-a"
//!
//! [store]
//! backend = "sqlite"
//! path = "/var/lib/reclaim/reclaim.db"
//!
//! [gc]
//! interval_secs = 600
//! delay_mins = 1440
//!
//! [gc.type_delay_mins]
//! Volume = 60
//!
//! [geo]
//! local_site = "site1"
//!
//! [[geo.sites]]
//! id = "site2"
//! endpoint = "https://site2.example:8543"
//! ```

use crate::deps::Site;
use crate::gc::RetentionConfig;
use crate::models::ObjectType;
use crate::query::DEFAULT_PAGE_SIZE;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Column store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process maps; contents are lost on exit.
    Memory,
    /// `SQLite` file.
    #[default]
    Sqlite,
}

impl StoreBackend {
    /// Parses a backend name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Configuration(format!(
                "unknown store backend '{other}' (expected memory or sqlite)"
            ))),
        }
    }

    /// Returns the backend name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Backend kind.
    pub backend: StoreBackend,
    /// Database path for the `SQLite` backend.
    pub path: PathBuf,
}

/// Query settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Columns fetched per page.
    pub page_size: usize,
}

/// Garbage collection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    /// Seconds between cycles.
    pub interval_secs: u64,
    /// Seconds before the first cycle.
    pub initial_delay_secs: u64,
    /// Retention policy and batch limit.
    pub retention: RetentionConfig,
    /// Milliseconds to wait for the GC lock.
    pub lock_wait_ms: u64,
    /// Seconds a GC lock lease lasts.
    pub lock_lease_secs: u64,
    /// Report without deleting.
    pub dry_run: bool,
}

impl GcConfig {
    /// Returns the cycle interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Returns the delay before the first cycle.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Returns the lock wait.
    #[must_use]
    pub const fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    /// Returns the lock lease.
    #[must_use]
    pub const fn lock_lease(&self) -> Duration {
        Duration::from_secs(self.lock_lease_secs)
    }
}

/// Geo replication settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoConfig {
    /// Id of this site.
    pub local_site: String,
    /// Per-request timeout for the dependency RPC.
    pub rpc_timeout_ms: u64,
    /// Known sites, the local one may be included.
    pub sites: Vec<Site>,
}

impl GeoConfig {
    /// Returns the RPC timeout.
    #[must_use]
    pub const fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

/// Metrics settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Whether to install the Prometheus exporter.
    pub enabled: bool,
    /// Exporter listen port.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Main configuration for reclaim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclaimConfig {
    /// Lock owner id of this node.
    pub node_id: String,
    /// Storage settings.
    pub store: StoreConfig,
    /// Query settings.
    pub query: QueryConfig,
    /// Garbage collection settings.
    pub gc: GcConfig,
    /// Geo replication settings.
    pub geo: GeoConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Node id.
    pub node_id: Option<String>,
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// Query section.
    pub query: Option<ConfigFileQuery>,
    /// GC section.
    pub gc: Option<ConfigFileGc>,
    /// Geo section.
    pub geo: Option<ConfigFileGeo>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Metrics section.
    pub metrics: Option<ConfigFileMetrics>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStore {
    /// Backend name.
    pub backend: Option<String>,
    /// Database path.
    pub path: Option<String>,
}

/// Query section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileQuery {
    /// Page size.
    pub page_size: Option<usize>,
}

/// GC section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileGc {
    /// Interval in seconds.
    pub interval_secs: Option<u64>,
    /// Initial delay in seconds.
    pub initial_delay_secs: Option<u64>,
    /// Retention delay in minutes.
    pub delay_mins: Option<i64>,
    /// Per-type retention delays keyed by type name.
    pub type_delay_mins: Option<HashMap<String, i64>>,
    /// Lock wait in milliseconds.
    pub lock_wait_ms: Option<u64>,
    /// Lock lease in seconds.
    pub lock_lease_secs: Option<u64>,
    /// Candidates per cycle.
    pub batch_limit: Option<usize>,
    /// Dry run.
    pub dry_run: Option<bool>,
}

/// Geo section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileGeo {
    /// Local site id.
    pub local_site: Option<String>,
    /// RPC timeout in milliseconds.
    pub rpc_timeout_ms: Option<u64>,
    /// Site list.
    pub sites: Option<Vec<Site>>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Format name.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

/// Metrics section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMetrics {
    /// Exporter enabled.
    pub enabled: Option<bool>,
    /// Exporter port.
    pub port: Option<u16>,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            node_id: uuid::Uuid::new_v4().to_string(),
            store: StoreConfig {
                backend: StoreBackend::Sqlite,
                path: default_store_path(),
            },
            query: QueryConfig {
                page_size: DEFAULT_PAGE_SIZE,
            },
            gc: GcConfig {
                interval_secs: 600,
                initial_delay_secs: 60,
                retention: RetentionConfig::default(),
                lock_wait_ms: 0,
                lock_lease_secs: 600,
                dry_run: false,
            },
            geo: GeoConfig {
                local_site: "site1".to_string(),
                rpc_timeout_ms: 5000,
                sites: Vec::new(),
            },
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl ReclaimConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// unusable value.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self::from_config_file(file)?.with_env_overrides())
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/reclaim/config.toml` on
    /// Linux). Falls back to defaults if no usable file is found. Env
    /// overrides are applied either way.
    #[must_use]
    pub fn load_default() -> Self {
        if let Some(dirs) = directories::ProjectDirs::from("", "", "reclaim") {
            let path = dirs.config_dir().join("config.toml");
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Ignoring config file"
                        );
                    },
                }
            }
        }
        Self::default().with_env_overrides()
    }

    /// Loads from `path` if given, else from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::load_default()), Self::load_from_file)
    }

    /// Converts a `ConfigFile` to `ReclaimConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(node_id) = file.node_id.filter(|n| !n.trim().is_empty()) {
            config.node_id = node_id;
        }
        if let Some(store) = file.store {
            if let Some(backend) = store.backend {
                config.store.backend = StoreBackend::parse(&backend)?;
            }
            if let Some(path) = store.path {
                config.store.path = PathBuf::from(path);
            }
        }
        if let Some(page_size) = file.query.and_then(|q| q.page_size) {
            config.query.page_size = page_size.max(1);
        }
        if let Some(gc) = file.gc {
            apply_gc_section(&mut config.gc, gc)?;
        }
        if let Some(geo) = file.geo {
            if let Some(local_site) = geo.local_site {
                config.geo.local_site = local_site;
            }
            if let Some(timeout) = geo.rpc_timeout_ms {
                config.geo.rpc_timeout_ms = timeout;
            }
            if let Some(sites) = geo.sites {
                config.geo.sites = sites;
            }
        }
        if let Some(logging) = file.logging {
            config.logging.format = logging.format;
            config.logging.file = logging.file.map(PathBuf::from);
        }
        if let Some(metrics) = file.metrics {
            if let Some(enabled) = metrics.enabled {
                config.metrics.enabled = enabled;
            }
            if let Some(port) = metrics.port {
                config.metrics.port = port;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies `RECLAIM_*` environment overrides.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(node_id) = parse_string_env("RECLAIM_NODE_ID") {
            self.node_id = node_id;
        }
        if let Some(backend) =
            parse_string_env("RECLAIM_STORE_BACKEND").and_then(|b| StoreBackend::parse(&b).ok())
        {
            self.store.backend = backend;
        }
        if let Some(path) = parse_string_env("RECLAIM_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(page_size) = parse_env::<usize>("RECLAIM_QUERY_PAGE_SIZE") {
            self.query.page_size = page_size.max(1);
        }

        if let Some(secs) = parse_env::<u64>("RECLAIM_GC_INTERVAL_SECS").filter(|s| *s > 0) {
            self.gc.interval_secs = secs;
        }
        if let Some(secs) = parse_env::<u64>("RECLAIM_GC_INITIAL_DELAY_SECS") {
            self.gc.initial_delay_secs = secs;
        }
        if let Some(ms) = parse_env::<u64>("RECLAIM_GC_LOCK_WAIT_MS") {
            self.gc.lock_wait_ms = ms;
        }
        if let Some(secs) = parse_env::<u64>("RECLAIM_GC_LOCK_LEASE_SECS").filter(|s| *s > 0) {
            self.gc.lock_lease_secs = secs;
        }
        if let Some(dry_run) = parse_bool_env("RECLAIM_GC_DRY_RUN") {
            self.gc.dry_run = dry_run;
        }
        self.gc.retention = self.gc.retention.with_env_overrides();

        if let Some(site) = parse_string_env("RECLAIM_GEO_LOCAL_SITE") {
            self.geo.local_site = site;
        }
        if let Some(ms) = parse_env::<u64>("RECLAIM_GEO_RPC_TIMEOUT_MS") {
            self.geo.rpc_timeout_ms = ms;
        }

        if let Some(format) = parse_string_env("RECLAIM_LOG_FORMAT") {
            self.logging.format = Some(format);
        }
        if let Some(file) = parse_string_env("RECLAIM_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        if let Some(enabled) = parse_bool_env("RECLAIM_METRICS_ENABLED") {
            self.metrics.enabled = enabled;
        }
        if let Some(port) = parse_env::<u16>("RECLAIM_METRICS_PORT") {
            self.metrics.port = port;
        }

        self
    }

    /// Checks values that cannot be clamped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a zero GC interval or lease, an
    /// empty local site id, or duplicate site ids.
    pub fn validate(&self) -> Result<()> {
        if self.gc.interval_secs == 0 {
            return Err(Error::Configuration(
                "gc.interval_secs must be positive".to_string(),
            ));
        }
        if self.gc.lock_lease_secs == 0 {
            return Err(Error::Configuration(
                "gc.lock_lease_secs must be positive".to_string(),
            ));
        }
        if self.geo.local_site.trim().is_empty() {
            return Err(Error::Configuration(
                "geo.local_site must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for site in &self.geo.sites {
            if !seen.insert(site.id.as_str()) {
                return Err(Error::Configuration(format!(
                    "geo site '{}' is listed twice",
                    site.id
                )));
            }
        }
        Ok(())
    }

    /// Sets the node id.
    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    /// Sets the store backend.
    #[must_use]
    pub const fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.store.backend = backend;
        self
    }

    /// Sets the `SQLite` database path.
    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }

    /// Sets the query page size (minimum 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.query.page_size = page_size.max(1);
        self
    }

    /// Sets the retention policy.
    #[must_use]
    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.gc.retention = retention;
        self
    }

    /// Enables or disables GC dry runs.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.gc.dry_run = dry_run;
        self
    }

    /// Sets the local site id.
    #[must_use]
    pub fn with_local_site(mut self, site: impl Into<String>) -> Self {
        self.geo.local_site = site.into();
        self
    }

    /// Sets the site list.
    #[must_use]
    pub fn with_sites(mut self, sites: Vec<Site>) -> Self {
        self.geo.sites = sites;
        self
    }
}

fn apply_gc_section(gc: &mut GcConfig, file: ConfigFileGc) -> Result<()> {
    if let Some(secs) = file.interval_secs {
        gc.interval_secs = secs;
    }
    if let Some(secs) = file.initial_delay_secs {
        gc.initial_delay_secs = secs;
    }
    if let Some(mins) = file.delay_mins {
        gc.retention.delay_mins = mins;
    }
    for (name, mins) in file.type_delay_mins.unwrap_or_default() {
        let object_type = ObjectType::parse(&name).ok_or_else(|| {
            Error::Configuration(format!("gc.type_delay_mins: unknown object type '{name}'"))
        })?;
        gc.retention.type_delay_mins.insert(object_type, mins);
    }
    if let Some(ms) = file.lock_wait_ms {
        gc.lock_wait_ms = ms;
    }
    if let Some(secs) = file.lock_lease_secs {
        gc.lock_lease_secs = secs;
    }
    if let Some(limit) = file.batch_limit {
        gc.retention.batch_limit = limit;
    }
    if let Some(dry_run) = file.dry_run {
        gc.dry_run = dry_run;
    }
    Ok(())
}

fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "reclaim").map_or_else(
        || PathBuf::from(".reclaim").join("reclaim.db"),
        |dirs| dirs.data_dir().join("reclaim.db"),
    )
}

fn parse_bool_env(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        let value = value.to_lowercase();
        value == "true" || value == "1" || value == "yes"
    })
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
}

fn parse_string_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
