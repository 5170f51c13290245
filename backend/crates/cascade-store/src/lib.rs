pub mod error;
pub mod model;
pub mod repository;

pub use error::StoreError;
pub use model::{AllocationStore, StoredAllocation};
pub use repository::{AllocationRepository, JsonFileRepository, MemoryRepository};
