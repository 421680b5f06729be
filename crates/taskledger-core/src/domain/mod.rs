//! Domain model (status machine, execution records, merge-updates, errors).

pub mod errors;
pub mod record;
pub mod status;
pub mod update;

pub use errors::LedgerError;
pub use record::{ApplyOutcome, ExecutionRecord};
pub use status::TaskStatus;
pub use update::StatusUpdate;
