//! Index constraints.
//!
//! A [`Constraint`] binds one index row (table + [`IndexKey`]) and a column
//! range derived from its [`ConstraintKind`]. Executing it pages through the
//! row with a [`HitIterator`]; hits come back in ascending composite-column
//! order: by secondary value, then time-token (oldest first), then target id.

use super::iterator::{ColumnFilter, HitIterator};
use super::Hit;
use crate::index::{
    self, DECOMMISSIONED_INDEX, INACTIVE_DISCRIMINATOR, IndexColumnName, IndexKey, LABEL_INDEX,
    RELATION_INDEX,
};
use crate::models::{ObjectType, TimeToken};
use crate::storage::ColumnStore;
use crate::{Error, Result};
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

/// Default number of columns fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// How a label constraint matches the folded label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelMatch {
    /// Labels starting with the value.
    Prefix(String),
    /// Labels equal to the value.
    Exact(String),
}

/// What a constraint selects inside its index row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Objects of `referrer` whose relation `field` holds the row's object.
    Containment {
        /// Referencing type.
        referrer: ObjectType,
        /// Relation field on the referencing type.
        field: String,
    },
    /// Objects of `object_type` in the row's container, matched by label.
    Label {
        /// Labelled type.
        object_type: ObjectType,
        /// Case-insensitive match.
        matcher: LabelMatch,
    },
    /// Decommissioned objects of `object_type`.
    Decommissioned {
        /// Decommissioned type.
        object_type: ObjectType,
        /// Exclusive upper bound on the inactivation time.
        older_than: Option<TimeToken>,
    },
}

impl ConstraintKind {
    /// Returns the index table this kind queries.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Containment { .. } => RELATION_INDEX,
            Self::Label { .. } => LABEL_INDEX,
            Self::Decommissioned { .. } => DECOMMISSIONED_INDEX,
        }
    }

    /// Returns the type that hits resolve to.
    #[must_use]
    pub const fn target_type(&self) -> ObjectType {
        match self {
            Self::Containment { referrer, .. } => *referrer,
            Self::Label { object_type, .. } | Self::Decommissioned { object_type, .. } => {
                *object_type
            },
        }
    }

    fn bounds(&self) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        match self {
            Self::Containment { referrer, field } => {
                index::prefix_bounds(index::secondary_exact_prefix(referrer.as_str(), field))
            },
            Self::Label {
                object_type,
                matcher: LabelMatch::Exact(label),
            } => index::prefix_bounds(index::secondary_exact_prefix(
                object_type.as_str(),
                &index::normalize_label(label),
            )),
            Self::Label {
                object_type,
                matcher: LabelMatch::Prefix(prefix),
            } => index::prefix_bounds(index::secondary_starts_with(
                object_type.as_str(),
                &index::normalize_label(prefix),
            )),
            Self::Decommissioned { older_than, .. } => {
                let prefix = index::secondary_exact_prefix(INACTIVE_DISCRIMINATOR, "");
                match older_than {
                    Some(marker) => {
                        let mut end = prefix.clone();
                        end.extend_from_slice(marker.as_bytes());
                        (Bound::Included(prefix), Bound::Excluded(end))
                    },
                    None => index::prefix_bounds(prefix),
                }
            },
        }
    }
}

/// A query bound to one index row.
#[derive(Clone)]
pub struct Constraint {
    store: Arc<dyn ColumnStore>,
    key: IndexKey,
    kind: ConstraintKind,
    page_size: usize,
}

impl Constraint {
    /// Creates a constraint over the row `key` of `kind`'s index table.
    #[must_use]
    pub fn new(store: Arc<dyn ColumnStore>, key: IndexKey, kind: ConstraintKind) -> Self {
        Self {
            store,
            key,
            kind,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the page size (at least one).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Returns `false` if the constraint has no usable index key.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty()
    }

    /// Returns the type that hits resolve to.
    #[must_use]
    pub const fn target_type(&self) -> ObjectType {
        self.kind.target_type()
    }

    /// Returns the bound index key.
    #[must_use]
    pub const fn key(&self) -> &IndexKey {
        &self.key
    }

    /// Returns the constraint kind.
    #[must_use]
    pub const fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// Returns the page size.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Starts a lazy scan over the matching columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the constraint is invalid.
    pub fn iter(&self) -> Result<HitIterator> {
        self.start(None)
    }

    /// Starts a lazy scan that skips columns rejected by `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the constraint is invalid.
    pub fn iter_filtered<F>(&self, filter: F) -> Result<HitIterator>
    where
        F: Fn(&IndexColumnName) -> bool + Send + 'static,
    {
        self.start(Some(Box::new(filter)))
    }

    /// Drives the scan to completion, passing every hit to `on_hit` in index
    /// order. Returns the number of hits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the constraint is invalid, or the
    /// first page failure as [`Error::QueryFailed`].
    pub fn execute<F>(&self, mut on_hit: F) -> Result<usize>
    where
        F: FnMut(Hit),
    {
        let mut count = 0;
        for hit in self.iter_with(Hit::from)? {
            on_hit(hit?);
            count += 1;
        }
        Ok(count)
    }

    /// Lazily builds one item per matched column with `build`, in index
    /// order. Pages are fetched as the sequence is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the constraint is invalid; page
    /// failures surface as items.
    pub fn iter_with<T, B>(
        &self,
        mut build: B,
    ) -> Result<impl Iterator<Item = Result<T>> + use<T, B>>
    where
        B: FnMut(IndexColumnName) -> T,
    {
        let mut columns = self.start(None)?;
        Ok(std::iter::from_fn(move || {
            columns.next_column().map(|column| column.map(&mut build))
        }))
    }

    /// Returns the first hit, if any, without scanning further.
    ///
    /// # Errors
    ///
    /// Same as [`Constraint::execute`].
    pub fn first(&self) -> Result<Option<Hit>> {
        self.iter()?.next().transpose()
    }

    fn start(&self, filter: Option<ColumnFilter>) -> Result<HitIterator> {
        if !self.is_valid() {
            return Err(Error::Configuration(format!(
                "constraint on {} has an empty index key",
                self.kind.table()
            )));
        }
        Ok(HitIterator::new(
            Arc::clone(&self.store),
            self.kind.table(),
            self.key.as_bytes().to_vec(),
            self.kind.bounds(),
            self.page_size,
            filter,
        ))
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("table", &self.kind.table())
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
