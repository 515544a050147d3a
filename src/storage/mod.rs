//! Storage layer.
//!
//! Two layers sit on top of each other:
//! - **Column store**: keyed rows of byte-sorted columns ([`MemoryColumnStore`],
//!   [`SqliteColumnStore`], optionally wrapped in a [`ResilientColumnStore`])
//! - **Object store**: persisted objects plus their secondary indexes
//!   ([`IndexedObjectStore`])

// Dropping connections slightly early provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod memory;
pub mod objects;
pub mod resilience;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryColumnStore;
pub use objects::IndexedObjectStore;
pub use resilience::{CircuitBreaker, ResilienceConfig, ResilientColumnStore};
pub use sqlite::SqliteColumnStore;
pub use traits::{
    Column, ColumnRange, ColumnStore, InactiveObject, InactiveObjects, ObjectStore,
};
