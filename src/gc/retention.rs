//! Retention policy for decommissioned objects.
//!
//! An object becomes a GC candidate once it has been inactive for longer than
//! its type's retention delay.
//!
//! # Configuration
//!
//! - Environment variable: `RECLAIM_GC_DELAY_MINS` (default: 1440)
//! - Per-type overrides: `RECLAIM_GC_<TYPE>_DELAY_MINS`, e.g.
//!   `RECLAIM_GC_VOLUME_DELAY_MINS`
//! - Config file: `[gc] delay_mins = 1440` and `[gc.type_delay_mins] Volume = 60`
//!
//! A delay of zero or less disables the time floor for that type: every
//! decommissioned object is a candidate.

use crate::models::{ObjectType, TimeToken};
use std::collections::HashMap;

/// Environment variable for the default retention delay in minutes.
pub const RETENTION_DELAY_ENV: &str = "RECLAIM_GC_DELAY_MINS";

/// Default retention delay in minutes (one day).
pub const DEFAULT_RETENTION_DELAY_MINS: i64 = 1440;

/// Retention policy configuration.
///
/// Supports a default delay and per-type overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Default retention delay in minutes.
    pub delay_mins: i64,

    /// Per-type retention overrides.
    ///
    /// Types not in this map use `delay_mins`.
    pub type_delay_mins: HashMap<ObjectType, i64>,

    /// Maximum candidates examined in a single cycle; 0 means unlimited.
    pub batch_limit: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            delay_mins: DEFAULT_RETENTION_DELAY_MINS,
            type_delay_mins: HashMap::new(),
            batch_limit: 0,
        }
    }
}

impl RetentionConfig {
    /// Creates a retention config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a retention config from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment overrides.
    ///
    /// Reads:
    /// - `RECLAIM_GC_DELAY_MINS`: default retention delay
    /// - `RECLAIM_GC_BATCH_LIMIT`: candidates per cycle
    /// - `RECLAIM_GC_<TYPE>_DELAY_MINS`: per-type overrides
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(mins) = env_parse::<i64>(RETENTION_DELAY_ENV) {
            self.delay_mins = mins;
        }

        if let Some(limit) = env_parse::<usize>("RECLAIM_GC_BATCH_LIMIT") {
            self.batch_limit = limit;
        }

        for object_type in ObjectType::all().iter().copied() {
            let key = format!(
                "RECLAIM_GC_{}_DELAY_MINS",
                object_type.as_str().to_uppercase()
            );
            if let Some(mins) = env_parse::<i64>(&key) {
                self.type_delay_mins.insert(object_type, mins);
            }
        }

        self
    }

    /// Sets the default retention delay.
    #[must_use]
    pub const fn with_delay_mins(mut self, mins: i64) -> Self {
        self.delay_mins = mins;
        self
    }

    /// Sets the batch limit.
    #[must_use]
    pub const fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Sets a per-type retention override.
    #[must_use]
    pub fn with_type_delay_mins(mut self, object_type: ObjectType, mins: i64) -> Self {
        self.type_delay_mins.insert(object_type, mins);
        self
    }

    /// Returns the effective retention delay for a type.
    #[must_use]
    pub fn effective_delay_mins(&self, object_type: ObjectType) -> i64 {
        self.type_delay_mins
            .get(&object_type)
            .copied()
            .unwrap_or(self.delay_mins)
    }

    /// Returns the retention marker for a type, computed now.
    ///
    /// Objects decommissioned strictly before the marker are candidates.
    /// `None` means there is no time floor.
    #[must_use]
    pub fn marker(&self, object_type: ObjectType) -> Option<TimeToken> {
        TimeToken::retention_marker(self.effective_delay_mins(object_type))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
