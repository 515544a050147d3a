//! Paginated hit iteration.
//!
//! A [`HitIterator`] pulls one bounded page at a time from the column store.
//! Each follow-up page starts strictly after the last column of the previous
//! one, so hits are neither duplicated nor skipped across page boundaries even
//! when columns are appended concurrently. Iteration ends only on an empty
//! page. After an error the iterator is fused and yields nothing further.

use super::Hit;
use crate::index::IndexColumnName;
use crate::storage::{Column, ColumnRange, ColumnStore};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, warn};

/// Predicate evaluated on each decoded column before a hit is built.
pub type ColumnFilter = Box<dyn Fn(&IndexColumnName) -> bool + Send>;

/// Lazy, single-consumer sequence of hits over one index row.
pub struct HitIterator {
    store: Arc<dyn ColumnStore>,
    table: &'static str,
    row: Vec<u8>,
    next_start: Bound<Vec<u8>>,
    end: Bound<Vec<u8>>,
    page_size: usize,
    filter: Option<ColumnFilter>,
    buffer: VecDeque<Column>,
    done: bool,
    pages_fetched: u64,
    skipped: u64,
}

impl HitIterator {
    pub(crate) fn new(
        store: Arc<dyn ColumnStore>,
        table: &'static str,
        row: Vec<u8>,
        range: (Bound<Vec<u8>>, Bound<Vec<u8>>),
        page_size: usize,
        filter: Option<ColumnFilter>,
    ) -> Self {
        Self {
            store,
            table,
            row,
            next_start: range.0,
            end: range.1,
            page_size: page_size.max(1),
            filter,
            buffer: VecDeque::new(),
            done: false,
            pages_fetched: 0,
            skipped: 0,
        }
    }

    /// Number of pages requested so far, including the terminal empty page.
    #[must_use]
    pub const fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Number of columns skipped by the filter or for failing to decode.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }

    fn fetch_page(&mut self) -> Result<()> {
        let range = ColumnRange::between(self.next_start.clone(), self.end.clone())
            .with_limit(self.page_size);
        let page = self
            .store
            .scan(self.table, &self.row, &range)
            .map_err(|e| match e {
                Error::QueryFailed { .. } => e,
                other => Error::query_failed("scan_page", other),
            })?;

        self.pages_fetched += 1;
        metrics::counter!("query_pages_fetched_total", "table" => self.table).increment(1);
        debug!(
            table = self.table,
            columns = page.len(),
            page = self.pages_fetched,
            "Fetched index page"
        );

        match page.last() {
            Some(last) => self.next_start = Bound::Excluded(last.name.clone()),
            None => self.done = true,
        }
        self.buffer.extend(page);
        Ok(())
    }

    fn skip(&mut self, reason: &'static str) {
        self.skipped += 1;
        metrics::counter!("query_columns_skipped_total", "reason" => reason).increment(1);
    }
}

impl HitIterator {
    /// Returns the next decoded column that passes the filter.
    pub(crate) fn next_column(&mut self) -> Option<Result<IndexColumnName>> {
        loop {
            if let Some(column) = self.buffer.pop_front() {
                let decoded = match IndexColumnName::decode(&column.name) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        warn!(
                            table = self.table,
                            row = %String::from_utf8_lossy(&self.row),
                            column = %hex::encode(&column.name),
                            error = %e,
                            "Skipping undecodable index column"
                        );
                        self.skip("undecodable");
                        continue;
                    },
                };
                if self.filter.as_ref().is_some_and(|keep| !keep(&decoded)) {
                    self.skip("filtered");
                    continue;
                }
                return Some(Ok(decoded));
            }

            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

impl Iterator for HitIterator {
    type Item = Result<Hit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_column().map(|column| column.map(Hit::from))
    }
}

impl std::iter::FusedIterator for HitIterator {}

impl fmt::Debug for HitIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HitIterator")
            .field("table", &self.table)
            .field("page_size", &self.page_size)
            .field("pages_fetched", &self.pages_fetched)
            .field("buffered", &self.buffer.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
