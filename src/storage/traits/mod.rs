//! Storage traits.

mod column;
mod object;

pub use column::{Column, ColumnRange, ColumnStore};
pub use object::{InactiveObject, InactiveObjects, ObjectStore};
