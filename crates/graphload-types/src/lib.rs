//! Shared types for the graphload bulk import engine.

pub mod error;
pub mod profile;
pub mod record;

pub use error::{ErrorKind, StoreError};
pub use profile::{DiskClass, SizingProfile};
pub use record::{ChunkRef, EntityClass, NodeRecord, RelRecord};
