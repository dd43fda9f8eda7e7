//! Store collaborators
//!
//! The pipeline talks to the remote document store only through the traits
//! in this module. `MemoryStore` implements all of them over a JSON fixture.

mod errors;
mod memory;
mod traits;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::{CountSource, MetadataSource, TupleSource};
