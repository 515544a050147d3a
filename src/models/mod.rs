//! Data models for reclaim.
//!
//! Identifiers, time-tokens, persisted objects and the type registry.

mod id;
mod object;
mod registry;
mod time_token;

pub use id::{ID_NAMESPACE, ObjectId};
pub use object::PersistedObject;
pub use registry::{FieldDescriptor, ObjectType, TypeDescriptor, TypeRegistry};
pub use time_token::TimeToken;
