//! Query hits.

use crate::index::IndexColumnName;
use crate::models::{ObjectId, TimeToken};
use serde::Serialize;

/// One matched index column, materialized for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hit {
    /// The object the column points at.
    pub id: ObjectId,
    /// Type name stored as the column discriminator.
    pub discriminator: String,
    /// Secondary value (folded label or relation field); `None` when empty.
    pub label: Option<String>,
    /// Time-token stored in the column.
    pub time_token: Option<TimeToken>,
}

impl From<IndexColumnName> for Hit {
    fn from(column: IndexColumnName) -> Self {
        Self {
            id: column.target,
            discriminator: column.discriminator,
            label: (!column.secondary.is_empty()).then_some(column.secondary),
            time_token: Some(column.time_token),
        }
    }
}
