//! Index metadata subsystem
//!
//! Schema facts the optimizer and emitter need about every index a query
//! touches: primary keys, flattened field properties, field lists, and the
//! links that join indexes together.
//!
//! # Lifetime
//!
//! A registry lives for one query. Nothing here is shared across queries.

mod errors;
mod link;
mod mapping;
mod registry;
mod relationships;

pub use errors::{MetadataError, MetadataErrorCode, MetadataResult};
pub use link::IndexLink;
pub use mapping::{FieldProperties, FieldType, IndexMapping, IndexMetadata, PropertyMapping};
pub use registry::IndexMetadataRegistry;
pub use relationships::{JoinLeg, RelationshipGraph};
