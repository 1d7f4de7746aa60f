//! Storage for Identity and Variant rows.
//!
//! [`RecordStore`] is the boundary the engine reads and mutates through;
//! [`InMemoryRecordStore`] is the reference backend.

mod eval;
mod memory;
mod traits;

pub use memory::InMemoryRecordStore;
pub use traits::{RecordStore, StorageError};
