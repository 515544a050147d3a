//! Property-based tests for index encoding and paginated iteration.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Encoded column names sort exactly like their decoded tuples
//! - Constraint hits come back in ascending tuple order
//! - Paging with any page size yields the same hits as one unbounded scan
//! - Filtered columns are skipped without stalling across page boundaries

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use reclaim::index::{IndexColumnName, IndexKey, RELATION_INDEX};
use reclaim::query::{Constraint, ConstraintKind};
use reclaim::storage::{ColumnStore, MemoryColumnStore};
use reclaim::{ObjectId, ObjectType, Result, TimeToken};
use std::collections::BTreeSet;
use std::sync::Arc;

const ROW: &str = "urn:reclaim:StoragePool:pool-1:site1";

fn column(millis: u64, suffix: &str) -> IndexColumnName {
    let target = ObjectId::parse(&format!("urn:reclaim:Volume:{suffix}:site1")).expect("id");
    IndexColumnName::new("Volume", "pool", TimeToken::floor(millis), target)
}

fn columns() -> impl Strategy<Value = BTreeSet<IndexColumnName>> {
    proptest::collection::btree_set(
        (0u64..1_000_000, "[a-z0-9]{1,8}").prop_map(|(ms, s)| column(ms, &s)),
        1..40,
    )
}

fn seeded(columns: &BTreeSet<IndexColumnName>) -> Arc<dyn ColumnStore> {
    let store = MemoryColumnStore::new();
    for column in columns {
        store
            .put(RELATION_INDEX, ROW.as_bytes(), &column.encode(), b"")
            .expect("put");
    }
    Arc::new(store)
}

fn constraint(store: Arc<dyn ColumnStore>, page_size: usize) -> Constraint {
    Constraint::new(
        store,
        IndexKey::new(ROW),
        ConstraintKind::Containment {
            referrer: ObjectType::Volume,
            field: "pool".to_string(),
        },
    )
    .with_page_size(page_size)
}

fn hit_keys(constraint: &Constraint) -> Vec<(Option<TimeToken>, ObjectId)> {
    constraint
        .iter()
        .expect("iter")
        .map(|hit| hit.map(|h| (h.time_token, h.id)))
        .collect::<Result<_>>()
        .expect("hits")
}

proptest! {
    /// Property: byte order of encoded names equals tuple order.
    #[test]
    fn prop_encoding_preserves_order(
        a in ("\\PC{0,6}", "\\PC{0,6}", 0u64..1000),
        b in ("\\PC{0,6}", "\\PC{0,6}", 0u64..1000),
    ) {
        let target = ObjectId::parse("urn:reclaim:Volume:x:site1").expect("id");
        let left = IndexColumnName::new(a.0, a.1, TimeToken::floor(a.2), target.clone());
        let right = IndexColumnName::new(b.0, b.1, TimeToken::floor(b.2), target);
        prop_assert_eq!(left.encode().cmp(&right.encode()), left.cmp(&right));
    }

    /// Property: strings containing NUL bytes survive encoding.
    #[test]
    fn prop_encoding_decodes_back(secondary in "[a-z\\x00]{0,12}", ms in 0u64..1000) {
        let name = column(ms, "v1");
        let name =
            IndexColumnName::new(name.discriminator, secondary, name.time_token, name.target);
        prop_assert_eq!(IndexColumnName::decode(&name.encode()).expect("decode"), name);
    }

    /// Property: hits are produced in ascending composite-key order.
    #[test]
    fn prop_hits_in_tuple_order(columns in columns()) {
        let expected: Vec<_> = columns
            .iter()
            .map(|c| (Some(c.time_token), c.target.clone()))
            .collect();
        let hits = hit_keys(&constraint(seeded(&columns), 1000));
        prop_assert_eq!(hits, expected);
    }

    /// Property: any page size yields the same hits as one unbounded scan.
    #[test]
    fn prop_pagination_is_complete(columns in columns(), page in 1usize..10) {
        let store = seeded(&columns);
        let unbounded = hit_keys(&constraint(Arc::clone(&store), columns.len() + 1));
        let paged = hit_keys(&constraint(store, page));
        prop_assert_eq!(unbounded.len(), columns.len());
        prop_assert_eq!(paged, unbounded);
    }

    /// Property: K rejected columns out of N yield exactly N - K hits.
    #[test]
    fn prop_filter_is_transparent(columns in columns(), page in 1usize..5, modulus in 2u64..5) {
        let store = seeded(&columns);
        let rejected = columns
            .iter()
            .filter(|c| c.time_token.unix_millis() % modulus == 0)
            .count();

        let mut iter = constraint(store, page)
            .iter_filtered(move |c| c.time_token.unix_millis() % modulus != 0)
            .expect("iter");
        let hits = iter.by_ref().collect::<Result<Vec<_>>>().expect("hits");

        prop_assert_eq!(hits.len(), columns.len() - rejected);
        prop_assert!(iter.next().is_none());
        prop_assert_eq!(iter.skipped(), u64::try_from(rejected).expect("count"));
    }
}

#[test]
fn test_other_referrer_fields_are_excluded() {
    let mut columns = BTreeSet::new();
    columns.insert(column(10, "a"));
    let store = seeded(&columns);
    let other = IndexColumnName::new(
        "Volume",
        "pools",
        TimeToken::floor(5),
        ObjectId::parse("urn:reclaim:Volume:b:site1").expect("id"),
    );
    store
        .put(RELATION_INDEX, ROW.as_bytes(), &other.encode(), b"")
        .expect("put");

    let hits = hit_keys(&constraint(store, 1));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].1, column(10, "a").target);
}
