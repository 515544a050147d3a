//! Time-tokens: globally unique, time-ordered values.
//!
//! A [`TimeToken`] wraps a UUIDv7. The first 48 bits are the Unix timestamp in
//! milliseconds, so byte-wise comparison of two tokens orders them by creation
//! time (ties broken by the random tail). Tokens minted in one process are
//! strictly increasing.

use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const MILLIS_PER_MINUTE: u64 = 60_000;

/// A monotonic, globally-orderable timestamp token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeToken(Uuid);

impl TimeToken {
    /// Encoded length in bytes.
    pub const LEN: usize = 16;

    /// Mints a new token for the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the smallest token that can carry `unix_millis`.
    ///
    /// Every token minted during that millisecond or later compares greater
    /// than or equal to the floor, every token minted earlier compares less.
    #[must_use]
    pub fn floor(unix_millis: u64) -> Self {
        Self(uuid::Builder::from_unix_timestamp_millis(unix_millis, &[0; 10]).into_uuid())
    }

    /// Returns the retention marker for a delay in minutes.
    ///
    /// A delay of zero or less means "no time floor" and yields `None`.
    #[must_use]
    pub fn retention_marker(delay_mins: i64) -> Option<Self> {
        let delay = u64::try_from(delay_mins).ok().filter(|d| *d > 0)?;
        let now = crate::current_timestamp_millis();
        Some(Self::floor(
            now.saturating_sub(delay.saturating_mul(MILLIS_PER_MINUTE)),
        ))
    }

    /// Returns the embedded Unix timestamp in milliseconds.
    #[must_use]
    pub fn unix_millis(&self) -> u64 {
        let bytes = self.0.as_bytes();
        bytes[..6]
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
    }

    /// Returns the embedded timestamp as a UTC date-time.
    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.unix_millis()).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Returns the 16 encoded bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Decodes a token from exactly 16 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataIntegrity`] if the slice has the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|e| Error::DataIntegrity(format!("invalid time-token: {e}")))
    }
}

impl fmt::Display for TimeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
