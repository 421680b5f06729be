//! In-memory implementations of the ports (development and tests).

mod memory_lock;
mod memory_store;

pub use memory_lock::InMemoryLockStore;
pub use memory_store::InMemoryRecordStore;
