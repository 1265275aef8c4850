pub mod connection;
pub mod operations;
pub mod store;

pub use operations::PostgresStateStore;
pub use store::{MemoryStateStore, StateStore};
