//! Constraint queries over the secondary indexes.
//!
//! Build constraints with [`ConstraintFactory`], then either pull hits lazily
//! with [`Constraint::iter`] or push them through a closure with
//! [`Constraint::execute`]. Executing an invalid constraint is a
//! [`crate::Error::Configuration`]; a valid constraint with no matches is an
//! empty `Ok`.

mod constraint;
mod factory;
mod hit;
mod iterator;

pub use constraint::{Constraint, ConstraintKind, DEFAULT_PAGE_SIZE, LabelMatch};
pub use factory::ConstraintFactory;
pub use hit::Hit;
pub use iterator::{ColumnFilter, HitIterator};
