mod batch;
mod engine;
mod snapshot;
mod transitions;

pub use batch::{BatchFailure, BatchMode, BatchReport, Operation, run_batch};
pub use engine::{Borrower, LendingEngine};
pub use snapshot::{LibrarySnapshot, SnapshotError};
