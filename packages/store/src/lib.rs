pub mod error;
pub mod models;
pub mod repo;

mod memory;
pub use memory::MemoryStore;

pub use error::StoreError;
pub use repo::{DocumentStore, Repository};
