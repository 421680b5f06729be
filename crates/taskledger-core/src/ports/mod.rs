//! Ports - the abstraction seams around external state.
//!
//! All shared mutable state lives behind these traits; components receive
//! store handles as constructor arguments, never as ambient singletons.

pub mod clock;
pub mod lock_store;
pub mod record_store;
pub mod status_source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use lock_store::LockStore;
pub use record_store::RecordStore;
pub use status_source::{RemoteStatus, StatusSource};
