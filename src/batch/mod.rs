//! Batch Processing Module
//!
//! Deferred, target-grouped execution of mutations.

mod operation;
mod processor;

pub use operation::{shared, BatchOperation, FnOperation, SharedTarget};
pub use processor::{run_batch, BatchConfig, BatchFailure, BatchProcessor};
